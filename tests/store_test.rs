use spendcat::{
    mock_transactions, ArtifactStore, StoreError, TrainingConfig, TrainingPipeline, TrainingRow,
};
use tempfile::tempdir;

fn train(rows: &[TrainingRow], max_features: usize) -> spendcat::Result<spendcat::ArtifactBlobs> {
    let mut config = TrainingConfig::small();
    config.encoder.max_features = max_features;
    config.booster.n_trees = 10;
    TrainingPipeline::new(config)?.fit(rows)?.artifacts.to_blobs()
}

#[tokio::test]
async fn test_publish_then_predict() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;

    let blobs = train(&mock_transactions(), 50)?;
    store.publish(&blobs).await?;

    let predictor = store.load_predictor()?;
    assert_eq!(predictor.info().run_id, blobs.run_id);
    let result = predictor.predict("WALGREENS PHARMACY #123", 8.5)?;
    assert_eq!(result.probabilities.len(), 8);

    // a second store on the same directory sees the same set
    let reopened = ArtifactStore::new(dir.path())?;
    assert_eq!(reopened.load_current()?, blobs);
    Ok(())
}

#[tokio::test]
async fn test_failed_training_keeps_previous_set() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    let published = train(&mock_transactions(), 50)?;
    store.publish(&published).await?;

    let mut broken = mock_transactions();
    broken.push(TrainingRow::new("BAD ROW", f64::NAN, "Shopping"));
    assert!(train(&broken, 50).is_err());

    assert_eq!(store.current_run_id()?, Some(published.run_id.clone()));
    assert_eq!(store.load_current()?, published);
    Ok(())
}

#[tokio::test]
async fn test_mismatched_set_is_never_published() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    let a = train(&mock_transactions(), 20)?;
    let b = train(&mock_transactions(), 40)?;
    store.publish(&a).await?;

    let mut mixed = b.clone();
    mixed.encoder = a.encoder.clone();
    let result = store.publish(&mixed).await;
    assert!(matches!(result, Err(StoreError::Artifact(_))));
    assert_eq!(store.current_run_id()?, Some(a.run_id.clone()));
    assert!(!store.run_dir(&b.run_id).exists());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_publishes_leave_one_current() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    let sets = vec![train(&mock_transactions(), 20)?, train(&mock_transactions(), 30)?];

    let mut tasks = Vec::new();
    for blobs in sets.clone() {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.publish(&blobs).await.map(|_| ()) }));
    }
    for task in tasks {
        task.await??;
    }

    let current = store.load_current()?;
    assert!(sets.contains(&current));
    Ok(())
}

#[test]
fn test_empty_store() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    assert!(!store.is_published());
    assert_eq!(store.current_run_id()?, None);
    assert!(matches!(store.load_predictor(), Err(StoreError::NotPublished(_))));
    Ok(())
}

#[tokio::test]
async fn test_relabeled_blobs_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path().join("store");
    let store = ArtifactStore::new(&root)?;
    let genuine = train(&mock_transactions(), 30)?;

    let mut escaping = genuine.clone();
    escaping.run_id = "../../escaped".to_string();
    assert!(matches!(store.publish(&escaping).await, Err(StoreError::Artifact(_))));
    assert!(!dir.path().join("escaped").exists());
    assert!(!root.join("escaped").exists());

    let mut relabeled = genuine.clone();
    relabeled.run_id = "abcdef".to_string();
    assert!(matches!(store.publish(&relabeled).await, Err(StoreError::Artifact(_))));
    assert!(!store.is_published());

    assert!(matches!(store.load_run("../../escaped"), Err(StoreError::InvalidRunId(_))));
    assert!(matches!(store.remove_run(".."), Err(StoreError::InvalidRunId(_))));

    store.publish(&genuine).await?;
    assert_eq!(store.current_run_id()?, Some(genuine.run_id.clone()));
    Ok(())
}

#[tokio::test]
async fn test_manifest_for_other_run_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    let first = train(&mock_transactions(), 20)?;
    let second = train(&mock_transactions(), 40)?;
    store.publish(&first).await?;
    store.publish(&second).await?;

    // copy the second run's manifest over the first one
    std::fs::copy(
        store.run_dir(&second.run_id).join("manifest.json"),
        store.run_dir(&first.run_id).join("manifest.json"),
    )?;
    assert!(matches!(store.load_run(&first.run_id), Err(StoreError::Artifact(_))));
    Ok(())
}
