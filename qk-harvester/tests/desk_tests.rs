//! Integration tests for the query desk over persisted artifacts

mod helpers;

use helpers::{message, Fixture};
use qk_harvester::alias::AliasChange;
use qk_harvester::desk::QuoteDesk;
use qk_harvester::HarvestError;

#[tokio::test]
async fn test_ambiguous_alias_survives_restart_unchanged() {
    let fixture = Fixture::new();
    let desk = QuoteDesk::new(fixture.state.clone());

    assert_eq!(desk.add_alias("Sam", "sammy").await.unwrap(), AliasChange::Added);
    let err = desk.add_alias("Pat", "sammy").await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::AmbiguousAlias { ref alias, ref owner } if alias == "sammy" && owner == "sam"
    ));

    let restarted = fixture.reopen();
    let aliases = restarted.aliases.read().await;
    assert_eq!(aliases.resolve("sammy"), "sam");
    assert!(!aliases.table().contains_key("pat"));
    assert!(aliases.is_consistent());

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fixture.aliases_path()).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({ "sam": ["sammy"] }));
}

#[tokio::test]
async fn test_queries_after_harvest() {
    let fixture = Fixture::new();
    let desk = QuoteDesk::new(fixture.state.clone());
    desk.add_alias("Samantha", "sam").await.unwrap();

    fixture.source.push(message("Go big - Sam", "Alex", "m/1", 30));
    fixture.source.push(message("Go home - samantha", "Alex", "m/2", 20));
    fixture.source.push(message("Don't quit - me", "Pat", "m/3", 10));
    fixture.harvester().run_pass().await.unwrap();

    let totals = desk.totals().await;
    assert_eq!(
        totals.per_author,
        vec![("Samantha".to_string(), 2), ("Pat".to_string(), 1)]
    );
    assert_eq!(totals.total, 3);

    assert_eq!(desk.author_history("sam").await.unwrap().len(), 2);
    assert_eq!(desk.author_quote("SAM", 0).await.unwrap().record.text(), "Go big - Sam");
    assert_eq!(desk.quote_by_index(2).await.unwrap().author, "Pat");
    assert_eq!(desk.random_quote(Some("pat")).await.unwrap().record.text(), "Don't quit - me");
    assert!(desk.random_quote(None).await.is_ok());

    assert!(matches!(desk.author_history("nobody").await, Err(HarvestError::NotFound(_))));
    assert!(matches!(
        desk.author_quote("pat", 1).await,
        Err(HarvestError::IndexOutOfRange { index: 1, len: 1 })
    ));
}

#[tokio::test]
async fn test_empty_archive_queries() {
    let fixture = Fixture::new();
    let desk = QuoteDesk::new(fixture.state.clone());

    assert!(matches!(desk.random_quote(None).await, Err(HarvestError::EmptyStore)));
    assert!(matches!(desk.quote_by_index(0).await, Err(HarvestError::EmptyStore)));
    assert_eq!(desk.totals().await.total, 0);
}

#[tokio::test]
async fn test_failed_alias_write_changes_nothing() {
    let fixture = Fixture::new();
    let desk = QuoteDesk::new(fixture.state.clone());
    desk.add_alias("John", "jon").await.unwrap();

    std::fs::create_dir(fixture.dir.path().join("aliases.json.tmp")).unwrap();
    let err = desk.add_alias("John", "johnny").await.unwrap_err();
    assert!(matches!(err, HarvestError::PersistenceFailure(_)));

    assert_eq!(desk.aliases_of("john").await, vec!["jon".to_string()]);
    assert_eq!(fixture.reopen().aliases.read().await.resolve("johnny"), "johnny");
}
