//! Command-line argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tpcopy_protocol::{TransferParams, TransferRequest, UserChecksum};

/// Verified third-party copies between storage endpoints
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (overrides $TPCOPY_CONFIG and the default path)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy one file from SRC to DST
    Copy(CopyArgs),
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source identifier (file://, stage:// or an absolute path)
    pub source: String,

    /// Destination identifier
    pub destination: String,

    /// Replace the destination if it exists
    #[arg(short, long, default_value = "false")]
    pub force: bool,

    /// Create the destination's parent directory
    #[arg(short, long, default_value = "false")]
    pub parent: bool,

    /// Checksum algorithm, optionally with the expected value (ALG[:VALUE])
    #[arg(short = 'K', long, value_name = "ALG[:VALUE]")]
    pub checksum: Option<String>,

    /// Verify checksums even without --checksum (uses the configured algorithm)
    #[arg(long, default_value = "false")]
    pub verify: bool,

    /// Ask the transport to skip its own pre- and post-copy checks
    #[arg(long, default_value = "false")]
    pub strict: bool,

    /// Backend type reported by probes of local staged paths
    #[arg(long, value_name = "NAME")]
    pub backend_type: Option<String>,

    /// Print the outcome as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,
}

impl CopyArgs {
    pub fn to_request(&self) -> TransferRequest {
        let user_checksum = self.checksum.as_deref().map(UserChecksum::parse);
        let params = TransferParams {
            replace_existing: self.force,
            create_parent_dir: self.parent,
            checksum_check: self.verify || user_checksum.is_some(),
            user_checksum,
            strict_copy_mode: self.strict,
        };
        TransferRequest::new(&self.source, &self.destination, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy_args(argv: &[&str]) -> CopyArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Copy(args) => args,
        }
    }

    #[test]
    fn minimal_copy() {
        let req = copy_args(&["tpcopy", "copy", "/a", "stage:///b"]).to_request();
        assert_eq!(req.source, "/a");
        assert_eq!(req.destination, "stage:///b");
        assert_eq!(req.params, TransferParams::default());
    }

    #[test]
    fn flags_map_to_params() {
        let req = copy_args(&[
            "tpcopy",
            "copy",
            "--force",
            "--parent",
            "--strict",
            "-K",
            "md5:abc",
            "/a",
            "/b",
        ])
        .to_request();
        assert!(req.params.replace_existing);
        assert!(req.params.create_parent_dir);
        assert!(req.params.strict_copy_mode);
        assert!(req.params.checksum_check);
        let user = req.params.user_checksum.unwrap();
        assert_eq!(user.algorithm, "md5");
        assert_eq!(user.value, "abc");
    }

    #[test]
    fn verify_without_checksum() {
        let req = copy_args(&["tpcopy", "copy", "--verify", "/a", "/b"]).to_request();
        assert!(req.params.checksum_check);
        assert!(req.params.user_checksum.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tpcopy", "copy", "/a", "/b", "-v", "--config", "/etc/t.json"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/t.json")));
    }

    #[test]
    fn missing_destination_is_an_error() {
        assert!(Cli::try_parse_from(["tpcopy", "copy", "/a"]).is_err());
    }
}
