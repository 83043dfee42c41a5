//! Generic autotools build: configure, make, make install.

use crate::context::BuildContext;
use crate::error::Result;
use crate::output;
use crate::runner::run;

/// Build the source tree in `ctx.cwd` and install it into the build output dir.
///
/// Runs `./configure --prefix=<build_dir>`, `make` and `make install` in
/// order. A failing step is handled by the runner's failure policy.
pub fn simple_build(ctx: &BuildContext) -> Result<()> {
    output::action(&format!("Building {}", ctx.cwd.display()));
    let prefix = format!("--prefix={}", ctx.build_dir().display());
    run(ctx, vec!["./configure".to_string(), prefix])?;
    run(ctx, "make")?;
    run(ctx, "make install")?;
    output::success(&format!("Installed into {}", ctx.build_dir().display()));
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Constants;
    use crate::context::FailurePolicy;
    use crate::error::Error;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, body).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_simple_build_runs_configure_make_install() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("out dir");
        std::fs::create_dir_all(&src).unwrap();

        // configure records its prefix into a makefile that installs one file
        write_script(
            &src.join("configure"),
            "#!/bin/sh\nprefix=\"${1#--prefix=}\"\nprintf 'all:\\n\\ttouch built\\ninstall:\\n\\tmkdir -p \"%s/bin\" && cp built \"%s/bin/tool\"\\n' \"$prefix\" \"$prefix\" > Makefile\n",
        );

        let ctx = BuildContext::new(Constants::with_prefix("/sw").build_dir(&out))
            .policy(FailurePolicy::ReturnError)
            .cwd(&src);

        if which_make().is_none() {
            return;
        }
        simple_build(&ctx).unwrap();
        assert!(src.join("built").exists());
        assert!(out.join("bin/tool").exists());
    }

    #[test]
    fn test_simple_build_stops_at_failing_configure() {
        let temp = tempdir().unwrap();
        write_script(&temp.path().join("configure"), "#!/bin/sh\nexit 1\n");

        let ctx = BuildContext::new(Constants::with_prefix("/sw"))
            .policy(FailurePolicy::ReturnError)
            .cwd(temp.path());

        let err = simple_build(&ctx).unwrap_err();
        match err {
            Error::CommandFailed { cmd, code } => {
                assert!(cmd.starts_with("./configure --prefix="), "{}", cmd);
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn which_make() -> Option<()> {
        std::process::Command::new("make")
            .arg("--version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|_| ())
    }
}
