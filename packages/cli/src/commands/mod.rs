pub mod fingerprint;
pub mod init;
pub mod order;
pub mod scan;
pub mod serve;

pub use fingerprint::{fingerprint, FingerprintArgs};
pub use init::{init, InitArgs};
pub use order::{order, OrderArgs};
pub use scan::{scan, ScanArgs};
pub use serve::{serve, ServeArgs};
