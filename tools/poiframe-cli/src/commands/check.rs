//! Check external tools and the database.

use std::path::PathBuf;
use std::process::ExitCode;

use poiframe_common::config::{config_file_path, AppConfig};
use poiframe_media_store::{MediaStore, SqliteStore};
use poiframe_render_engine::invoker::command_exists;

pub fn run(db: PathBuf, config: &AppConfig) -> anyhow::Result<ExitCode> {
    println!("poiframe System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;

    for (label, binary) in [
        ("Transform tool", &config.render.ffmpeg_bin),
        ("Metadata probe", &config.render.ffprobe_bin),
    ] {
        if command_exists(binary) {
            println!("[OK] {label}: {binary}");
        } else {
            println!("[FAIL] {label}: {binary} not found on PATH");
            all_ok = false;
        }
    }

    match SqliteStore::open(&db).and_then(|store| store.ensure_schema()) {
        Ok(()) => println!("[OK] Database schema: {}", db.display()),
        Err(err) => {
            println!("[FAIL] Database: {err}");
            all_ok = false;
        }
    }

    println!("     Config file: {}", config_file_path().display());

    println!();
    if all_ok {
        println!("Everything needed for snapshot regeneration is available.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Some requirements are missing. See above for fixes.");
        Ok(ExitCode::FAILURE)
    }
}
