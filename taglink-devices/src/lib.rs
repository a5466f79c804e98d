//! Device Adapter Port (§4.4): one uniform interface over the five playback endpoint kinds —
//! SD-player, multi-room (UPnP AVTransport), cast, AirPlay-like (LinkPlay/Arylic), and browser.
//!
//! Each kind lives in its own module and implements [`DeviceAdapter`]; [`DeviceRegistry`] is the
//! process-wide cache of live adapter instances the Orchestrator and Liveness Supervisor share.

mod adapter;
mod airplay;
mod browser;
mod cast;
mod error;
mod multiroom;
mod registry;
mod sd_player;
mod soap;

pub use adapter::{AdapterHandle, DeviceAdapter, PositionInfo, TransportState};
pub use airplay::AirplayLikeAdapter;
pub use browser::BrowserAdapter;
pub use cast::{new_cast_adapter, CastAdapter};
pub use error::DeviceError;
pub use multiroom::MultiroomAdapter;
pub use registry::DeviceRegistry;
pub use sd_player::SdPlayerAdapter;
