//! Subnet allocation on third-octet boundaries.
//!
//! Each derived subnet occupies one full third-octet step above the base
//! block: a `/16` VPC at `10.0.0.0` yields `10.0.0.0/24`, `10.0.1.0/24`, and so
//! on. The output prefix is the configured subnet mask, not derived from the
//! arithmetic.
//!
//! Public subnets for zone `i` use index `i`; private subnets use
//! `i + zone_count`. The allocator has no memory between calls, so keeping the
//! two tiers disjoint is the job of [`plan_subnets`].

use serde::Serialize;
use tracing::debug;

use crate::error::AllocationError;

use super::cidr::{AddressBlock, MAX_PREFIX};

/// Derives the subnet at `index` from `base`, using `mask` as its prefix.
///
/// Only the third octet moves. Octets one, two and four are copied from the
/// base block.
///
/// # Errors
///
/// Returns [`AllocationError::AddressSpaceExhausted`] if the third octet would
/// exceed 255, and [`AllocationError::InvalidMask`] if `mask` exceeds 32.
pub fn allocate(base: &AddressBlock, index: u32, mask: u8) -> Result<AddressBlock, AllocationError> {
    if mask > MAX_PREFIX {
        return Err(AllocationError::InvalidMask { mask });
    }

    let [a, b, c, d] = base.octets();
    let third = u32::from(c).saturating_add(index);
    let third = u8::try_from(third).map_err(|_| AllocationError::AddressSpaceExhausted {
        base: base.to_string(),
        index,
        octet: third,
    })?;

    AddressBlock::new([a, b, third, d], mask)
}

/// Allocator bound to one VPC block and one subnet mask.
#[derive(Debug, Clone, Copy)]
pub struct SubnetAllocator {
    base: AddressBlock,
    mask: u8,
}

impl SubnetAllocator {
    /// Creates an allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if `mask` exceeds 32.
    pub fn new(base: AddressBlock, mask: u8) -> Result<Self, AllocationError> {
        if mask > MAX_PREFIX {
            return Err(AllocationError::InvalidMask { mask });
        }
        Ok(Self { base, mask })
    }

    /// Returns the base block.
    #[must_use]
    pub const fn base(&self) -> &AddressBlock {
        &self.base
    }

    /// Returns the subnet mask applied to every derived block.
    #[must_use]
    pub const fn mask(&self) -> u8 {
        self.mask
    }

    /// Derives the subnet at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address space is exhausted.
    pub fn allocate(&self, index: u32) -> Result<AddressBlock, AllocationError> {
        allocate(&self.base, index, self.mask)
    }
}

/// Subnet tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Internet-routable subnets behind the internet gateway.
    Public,
    /// Subnets without a route to the internet gateway.
    Private,
}

impl Tier {
    /// Returns the subnet index for `zone_index` under the allocation policy.
    #[must_use]
    pub const fn index(self, zone_index: u32, zone_count: u32) -> u32 {
        match self {
            Self::Public => zone_index,
            Self::Private => zone_index.saturating_add(zone_count),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// The pair of subnets owned by one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneSubnets {
    /// Position of the zone in the selected zone set.
    pub index: usize,
    /// Zone name.
    pub zone: String,
    /// Public subnet block.
    pub public: AddressBlock,
    /// Private subnet block.
    pub private: AddressBlock,
}

/// All derived subnets for a stack, in zone order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetLayout {
    /// VPC block the subnets were derived from.
    pub vpc: AddressBlock,
    /// Subnet mask of every derived block.
    pub mask: u8,
    /// Per-zone subnets.
    pub zones: Vec<ZoneSubnets>,
}

impl SubnetLayout {
    /// Returns every derived block, public tier first.
    #[must_use]
    pub fn blocks(&self) -> Vec<(Tier, &str, AddressBlock)> {
        let public = self.zones.iter().map(|z| (Tier::Public, z.zone.as_str(), z.public));
        let private = self.zones.iter().map(|z| (Tier::Private, z.zone.as_str(), z.private));
        public.chain(private).collect()
    }

    /// Returns the public blocks in zone order.
    #[must_use]
    pub fn public_blocks(&self) -> Vec<AddressBlock> {
        self.zones.iter().map(|z| z.public).collect()
    }

    /// Returns the private blocks in zone order.
    #[must_use]
    pub fn private_blocks(&self) -> Vec<AddressBlock> {
        self.zones.iter().map(|z| z.private).collect()
    }
}

/// Derives the public and private subnet for every zone.
///
/// # Errors
///
/// Returns the first allocation error; no partial layout is produced.
pub fn plan_subnets(
    allocator: &SubnetAllocator,
    zones: &[String],
) -> Result<SubnetLayout, AllocationError> {
    if zones.is_empty() {
        return Err(AllocationError::NoZones);
    }

    let zone_count = u32::try_from(zones.len()).unwrap_or(u32::MAX);

    let mut layout = Vec::with_capacity(zones.len());
    for (i, zone) in (0u32..).zip(zones) {
        let public = allocator.allocate(Tier::Public.index(i, zone_count))?;
        let private = allocator.allocate(Tier::Private.index(i, zone_count))?;
        debug!("Zone {zone}: public {public}, private {private}");
        layout.push(ZoneSubnets {
            index: layout.len(),
            zone: zone.clone(),
            public,
            private,
        });
    }

    Ok(SubnetLayout {
        vpc: *allocator.base(),
        mask: allocator.mask(),
        zones: layout,
    })
}
