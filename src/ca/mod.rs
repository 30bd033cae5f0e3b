//! The certificate authority of the cluster.

mod config;
pub use self::config::{CaConfig, resolve_password};

mod event;
pub use self::event::{CaChangeListener, CaChangedEvent, EventCounter, NoopListener};

mod manager;
pub use self::manager::{CaManager, CaSource, CertificateAuthority};
