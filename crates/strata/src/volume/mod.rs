//! Volume lifecycle management.
//!
//! A volume is a tagged thin volume mounted over an existing directory by a
//! generated mount unit. Per path the lifecycle is:
//!
//! ```text
//! Absent --create--> Attached <--attach/detach--> Detached --remove--> Absent
//! ```

mod manager;
mod request;
mod status;

pub use manager::{HostVolumeManager, VolumeManager};
pub use request::{VolumeEvent, VolumeOperation, VolumeRequest};
pub use status::{VolumeState, VolumeStatus};
