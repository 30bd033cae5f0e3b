//! Commands related to the certificate authority.

use std::{fs, path::PathBuf};

use secrecy::SecretString;

use super::CliError;
use crate::{
    ca::CaManager,
    cli::report::Report,
    commons::{error::PreflightIoError, util::file},
};

//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// Show the active CA
    Show,

    /// Generate a new CA
    Create(Create),

    /// Import a CA from PEM or PKCS#12 files
    Upload(Upload),

    /// Show the CA certificate in PEM format
    Cert,

    /// Write the CA keystore to a PKCS#12 file
    Export(Export),
}

impl Command {
    pub fn run(self, manager: &CaManager) -> Result<Report, CliError> {
        match self {
            Self::Show => Ok(Report::CertificateAuthority(manager.get()?)),
            Self::Create(cmd) => cmd.run(manager),
            Self::Upload(cmd) => cmd.run(manager),
            Self::Cert => Ok(Report::Pem(manager.ca_certificate_pem()?)),
            Self::Export(cmd) => cmd.run(manager),
        }
    }
}

//-------- Create ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Create {
    /// The organization named in the CA certificate
    #[arg(long, short)]
    organization: String,

    /// Validity of the CA certificate in days
    #[arg(long, value_name = "number")]
    days: Option<u32>,
}

impl Create {
    fn run(self, manager: &CaManager) -> Result<Report, CliError> {
        let ca = manager.create(&self.organization, self.days, None)?;
        Ok(Report::CertificateAuthority(ca))
    }
}

//-------- Upload ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Upload {
    /// Password of the uploaded private key or keystore
    #[arg(long, env = "PREFLIGHT_UPLOAD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PEM or PKCS#12 files, later files replace earlier ones
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Upload {
    fn run(self, manager: &CaManager) -> Result<Report, CliError> {
        let mut parts = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let bytes = fs::read(path)
                .map_err(|e| PreflightIoError::new(format!("Cannot read file '{}'", path.display()), e))?;
            parts.push(bytes);
        }

        let password = self.password.map(SecretString::new);
        manager.upload(password.as_ref(), &parts)?;
        Ok(Report::CertificateAuthority(manager.get()?))
    }
}

//-------- Export ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Export {
    /// The file to write to
    #[arg(long, value_name = "path")]
    out: PathBuf,

    /// Password for the exported keystore
    #[arg(long, env = "PREFLIGHT_EXPORT_PASSWORD", hide_env_values = true)]
    password: String,
}

impl Export {
    fn run(self, manager: &CaManager) -> Result<Report, CliError> {
        let keystore = manager.export(&SecretString::new(self.password))?;
        file::save(keystore.as_der(), &self.out)?;
        Ok(Report::Success(format!("Exported CA to '{}'", self.out.display())))
    }
}
