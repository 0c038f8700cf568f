//! Geometry utilities: SE3 transforms, plane homographies, planar PnP solving.

pub mod homography;
pub mod pnp;
pub mod se3;
pub mod so3;

pub use homography::{HomographyError, estimate_homography_dlt};
pub use pnp::{PnPConfig, PnPError, PnPResult, solve_pnp_planar};
pub use se3::SE3;
