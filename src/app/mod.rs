//! Application core: the node's control loop and the seams it talks
//! through.
//!
//! [`service::NodeService`] owns the sample buffer, the recalibration
//! machine, the baseline counter and the report publisher. All
//! interaction with hardware happens through the **port traits** in
//! [`ports`], so the whole loop runs on the host under test.

pub mod events;
pub mod ports;
pub mod service;
