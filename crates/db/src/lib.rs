pub mod connection;
pub mod email;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod storage;

pub use connection::{connect, connect_with_config, connect_with_settings, ping, DbPool};
pub use email::{
    email_dispatcher_from_config, send_templated_email, EmailDispatcher, EmailError,
    FunctionEmailDispatcher, RecordingEmailDispatcher,
};
pub use fixtures::{DemoCatalog, SeedResult, VerificationResult};
pub use storage::{
    storage_lister_from_config, HttpStorageLister, LocalStorageLister, StorageError,
};
