//! Launcher script that starts the GUI inside the managed environment.

use std::path::Path;

use super::BootstrapError;

/// Script text for this platform.
pub fn launcher_script(venv_dir: &Path, front_end: &Path) -> String {
    if cfg!(windows) {
        format!(
            "@echo off\r\ncd /d \"%~dp0\"\r\ncall \"{}\\Scripts\\activate\"\r\n\"{}\" gui\r\npause\r\n",
            venv_dir.display(),
            front_end.display()
        )
    } else {
        format!(
            "#!/bin/bash\ncd \"$(dirname \"$0\")\"\nsource \"{}/bin/activate\"\n\"{}\" gui\n",
            venv_dir.display(),
            front_end.display()
        )
    }
}

/// Write the launcher and make it executable.
pub fn write_launcher(path: &Path, contents: &str) -> Result<(), BootstrapError> {
    std::fs::write(path, contents).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(
            |source| BootstrapError::Io {
                path: path.to_path_buf(),
                source,
            },
        )?;
    }

    Ok(())
}
