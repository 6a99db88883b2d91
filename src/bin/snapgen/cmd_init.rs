use anyhow::Result;
use std::path::PathBuf;

use snapgen::consts::RECORDS_DIR;
use snapgen::FsStore;

pub fn exec(path: PathBuf) -> Result<()> {
    let existed = path.join(RECORDS_DIR).exists();
    FsStore::open(&path)?;
    if existed {
        println!("Store already initialized at {}", path.display());
    } else {
        println!("Initialized store at {}", path.display());
    }
    Ok(())
}
