//! Create the database schema.

use std::path::PathBuf;

use poiframe_media_store::init_database;

pub fn run(db: PathBuf, reset: bool) -> anyhow::Result<()> {
    init_database(&db, reset)?;
    if reset {
        println!("Recreated database: {}", db.display());
    } else {
        println!("Database ready: {}", db.display());
    }
    Ok(())
}
