//! Morton (Z-order) codes over integer cell coordinates.
//!
//! Bits are interleaved X, Y, Z starting at bit 0, so the low three bits of a
//! code are the octant of the cell inside its parent:
//! - bit 0: X
//! - bit 1: Y
//! - bit 2: Z

use glam::{IVec3, UVec3};

/// Spatial sort key of an octree cell.
pub type MortonCode = u64;

/// Maximum coordinate bits per axis.
pub const MAX_AXIS_BITS: u32 = 21;

#[inline]
fn spread_bits(v: u32) -> u64 {
  let mut x = v as u64 & 0x1f_ffff;
  x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
  x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
  x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
  x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
  x = (x | (x << 2)) & 0x1249_2492_4924_9249;
  x
}

#[inline]
fn compact_bits(code: u64) -> u32 {
  let mut x = code & 0x1249_2492_4924_9249;
  x = (x ^ (x >> 2)) & 0x10c3_0c30_c30c_30c3;
  x = (x ^ (x >> 4)) & 0x100f_00f0_0f00_f00f;
  x = (x ^ (x >> 8)) & 0x001f_0000_ff00_00ff;
  x = (x ^ (x >> 16)) & 0x001f_0000_0000_ffff;
  x = (x ^ (x >> 32)) & 0x1f_ffff;
  x as u32
}

/// Interleave cell coordinates into a Morton code.
#[inline]
pub fn encode(coords: UVec3) -> MortonCode {
  spread_bits(coords.x) | (spread_bits(coords.y) << 1) | (spread_bits(coords.z) << 2)
}

/// De-interleave a Morton code into cell coordinates.
#[inline]
pub fn decode(code: MortonCode) -> UVec3 {
  UVec3::new(compact_bits(code), compact_bits(code >> 1), compact_bits(code >> 2))
}

/// Encode signed coordinates, returning `None` when any axis falls outside
/// `0..edge`.
#[inline]
pub fn encode_checked(coords: IVec3, edge: u32) -> Option<MortonCode> {
  let edge = edge as i32;
  if coords.cmplt(IVec3::ZERO).any() || coords.cmpge(IVec3::splat(edge)).any() {
    return None;
  }
  Some(encode(coords.as_uvec3()))
}

/// Code of the enclosing cell one layer up.
#[inline]
pub const fn parent(code: MortonCode) -> MortonCode {
  code >> 3
}

/// Code of the enclosing cell `levels` layers up.
#[inline]
pub const fn ancestor(code: MortonCode, levels: u32) -> MortonCode {
  code >> (3 * levels)
}

/// Code of the first (octant 0) child one layer down.
#[inline]
pub const fn first_child(code: MortonCode) -> MortonCode {
  code << 3
}

/// Code of a specific child one layer down.
#[inline]
pub const fn child(code: MortonCode, octant: u8) -> MortonCode {
  (code << 3) | (octant as u64 & 7)
}

/// Octant of a cell inside its parent.
#[inline]
pub const fn octant(code: MortonCode) -> u8 {
  (code & 7) as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_axis_bit_positions() {
    assert_eq!(encode(UVec3::new(1, 0, 0)), 0b001);
    assert_eq!(encode(UVec3::new(0, 1, 0)), 0b010);
    assert_eq!(encode(UVec3::new(0, 0, 1)), 0b100);
    assert_eq!(encode(UVec3::new(2, 0, 0)), 0b001_000);
    assert_eq!(encode(UVec3::new(3, 3, 3)), 0b111_111);
  }

  #[test]
  fn test_encode_decode_round_trip() {
    for &coords in &[
      UVec3::ZERO,
      UVec3::new(1, 2, 3),
      UVec3::new(1023, 0, 511),
      UVec3::new(1023, 1023, 1023),
      UVec3::new((1 << MAX_AXIS_BITS) - 1, 7, 12345),
    ] {
      assert_eq!(decode(encode(coords)), coords);
    }
  }

  #[test]
  fn test_parent_child_relationship() {
    let code = encode(UVec3::new(5, 6, 7));
    for octant in 0..8u8 {
      let c = child(code, octant);
      assert_eq!(parent(c), code);
      assert_eq!(super::octant(c), octant);
      let coords = decode(c);
      assert_eq!(coords, UVec3::new(5, 6, 7) * 2 + UVec3::new(
        (octant & 1) as u32,
        ((octant >> 1) & 1) as u32,
        ((octant >> 2) & 1) as u32,
      ));
    }
    assert_eq!(first_child(code), child(code, 0));
    assert_eq!(ancestor(child(child(code, 3), 5), 2), code);
  }

  #[test]
  fn test_encode_checked_rejects_out_of_range() {
    assert_eq!(encode_checked(IVec3::new(-1, 0, 0), 4), None);
    assert_eq!(encode_checked(IVec3::new(0, 4, 0), 4), None);
    assert_eq!(encode_checked(IVec3::new(3, 3, 3), 4), Some(63));
  }
}
