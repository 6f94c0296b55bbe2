//! Network addressing for the stack.
//!
//! - [`cidr`]: the `AddressBlock` value type
//! - [`allocator`]: third-octet subnet derivation and the public/private policy
//! - [`zones`]: availability zone selection

pub mod allocator;
pub mod cidr;
pub mod zones;

pub use allocator::{allocate, plan_subnets, SubnetAllocator, SubnetLayout, Tier, ZoneSubnets};
pub use cidr::AddressBlock;
pub use zones::{select_zones, truncate_zones, ConfiguredZones, ZoneSource, MAX_ZONES};
