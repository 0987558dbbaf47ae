mod ec_point_formats;
mod server_name;
mod signature_algorithms;
mod supported_groups;
mod use_srtp;

pub use ec_point_formats::{ECPointFormatsExtension, PointFormat};
pub use server_name::ServerNameExtension;
pub use signature_algorithms::SignatureAlgorithmsExtension;
pub use supported_groups::SupportedGroupsExtension;
pub use use_srtp::{SrtpProfileId, UseSrtpExtension};
