use crate::add::add;
use crate::sentence::SentenceSource;
use crate::study::Study;
use anyhow::{anyhow, Result};

/// Creates an empty store, then lets the user add the first notes.
pub fn init(study: &Study, source: &dyn SentenceSource) -> Result<()> {
    create_store(study)?;
    println!("Created new store {:?}\n", study.store().path());
    add(study, source, false)
}

fn create_store(study: &Study) -> Result<()> {
    let path = study.store().path();
    if path.exists() {
        return Err(anyhow!(
            "File {:?} already exists! Use `repaso add` to add new notes. Aborting.",
            path
        ));
    }
    study.store().init()?;
    Ok(())
}

#[test]
fn test_create_store_refuses_existing_file() {
    use crate::models::Snapshot;
    use crate::study::test_study;
    use chrono::{TimeZone, Utc};

    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap();
    let (study, _) = test_study(dir.path(), now);

    create_store(&study).unwrap();
    assert_eq!(study.snapshot().unwrap(), Snapshot::default());

    let err = create_store(&study).unwrap_err().to_string();
    assert!(err.starts_with("File "));
    assert!(err.ends_with("already exists! Use `repaso add` to add new notes. Aborting."));
}
