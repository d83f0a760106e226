pub mod config;
pub mod editor;
pub mod logging;
pub mod validation;

pub use config::{
    parse_config, serialize_config, Integrity, IpMapping, NginxConfig, Settings, Upstream, UpstreamServer,
};
pub use editor::{ConfigEditor, EditError};
pub use validation::{check, Report};
