use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(
    scaffold_home: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(home) = scaffold_home {
        return Some(home.join(".env"));
    }
    Some(home_dir?.join(".scaffold/.env"))
}

/// Load `.env` from the working directory, else from the scaffold home.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("SCAFFOLD_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
