//! Implementation of the [Twofish][1] block cipher with a 128-bit key.
//!
//! This crate provides only the block primitive; block-cipher modes live in
//! their own crates and wrap the [`cipher`] traits implemented here. Note
//! that this key schedule and round packing are not interoperable with the
//! published Twofish test vectors.
//!
//! # Examples
//! ```
//! use twofish::Twofish;
//! use twofish::cipher::{
//!     generic_array::GenericArray,
//!     BlockDecrypt, BlockEncrypt, NewBlockCipher,
//! };
//! use hex_literal::hex;
//!
//! let key = hex!("9F589F5CF6122C32B6BFEC2F2AE8C35A");
//! let plaintext = hex!("D491DB16E7B1C39E86CB086B789F5419");
//!
//! let cipher = Twofish::new(GenericArray::from_slice(&key));
//!
//! let mut block = GenericArray::clone_from_slice(&plaintext);
//! cipher.encrypt_block(&mut block);
//! assert_ne!(&plaintext[..], &block[..]);
//!
//! cipher.decrypt_block(&mut block);
//! assert_eq!(&plaintext[..], &block[..]);
//! ```
//!
//! [1]: https://en.wikipedia.org/wiki/Twofish
#![no_std]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg",
    html_favicon_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg"
)]
#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub use cipher;

use byteorder::{ByteOrder, BE};
use cipher::{
    consts::{U1, U16},
    generic_array::GenericArray,
    BlockCipher, BlockDecrypt, BlockEncrypt, NewBlockCipher,
};

mod consts;

use crate::consts::{MDS, MDS_MODULUS, QT, RHO, RS, RS_MODULUS};

/// Block over which the Twofish cipher operates.
pub type Block = GenericArray<u8, U16>;
/// The Twofish cipher initialization key.
pub type Key = GenericArray<u8, U16>;

/// Carry-less polynomial multiplication over GF(2).
fn poly_mul(mut a: u32, mut b: u32) -> u32 {
    let mut t = 0;
    while a != 0 {
        if a & 1 != 0 {
            t ^= b;
        }
        b <<= 1;
        a >>= 1;
    }
    t
}

/// Reduces a polynomial product into the byte field defined by `modulus`.
fn gf_reduce(mut a: u32, modulus: u32) -> u32 {
    let mut m = modulus << 7;
    for _ in 0..8 {
        let t = a ^ m;
        if t < a {
            a = t;
        }
        m >>= 1;
    }
    a
}

fn gf_mul(a: u32, b: u32, modulus: u32) -> u32 {
    gf_reduce(poly_mul(a, b), modulus)
}

#[inline(always)]
fn byte(x: u32, i: usize) -> u8 {
    (x >> (8 * i)) as u8
}

/// Rotates the low nibble right by one bit.
#[inline(always)]
fn ror4(x: u8) -> u8 {
    ((x << 3) & 0xF) | ((x & 0xF) >> 1)
}

/// Fixed byte permutation, variant `op` (0 or 1).
fn q(x: u8, op: usize) -> u8 {
    let t = &QT[op];

    let a0 = x >> 4;
    let b0 = x & 0xF;
    let a1 = a0 ^ b0;
    let b1 = a0 ^ ror4(b0) ^ ((8 * a0) & 0xF);

    let a2 = t[0][usize::from(a1)];
    let b2 = t[1][usize::from(b1)];
    let a3 = a2 ^ b2;
    let b3 = a2 ^ ror4(b2) ^ ((8 * a2) & 0xF);

    let a4 = t[2][usize::from(a3)];
    let b4 = t[3][usize::from(b3)];

    (b4 << 4) | a4
}

/// Mixes four bytes through the MDS matrix into a word, row `j` landing in
/// byte `j`.
fn mds_mix(x: &[u8; 4]) -> u32 {
    let mut y = 0;
    for j in 0..4 {
        let mut t = 0;
        for k in 0..4 {
            t ^= gf_mul(u32::from(MDS[j][k]), u32::from(x[k]), MDS_MODULUS);
        }
        y |= t << (8 * j);
    }
    y
}

/// Compresses eight key bytes into a schedule word through the RS matrix.
fn rs_mix(m: &[u8]) -> u32 {
    let mut y = 0;
    for j in 0..4 {
        let mut t = 0;
        for k in 0..8 {
            t ^= gf_mul(u32::from(RS[j][k]), u32::from(m[k]), RS_MODULUS);
        }
        y |= t << (8 * j);
    }
    y
}

/// Key-dependent word substitution: chained q lookups keyed by `s`, then MDS
/// mixing of the permuted bytes.
fn g(x: u32, s: &[u32; 2]) -> u32 {
    let y0 = q(q(q(byte(x, 0), 0) ^ byte(s[0], 0), 0) ^ byte(s[1], 0), 1);
    let y1 = q(q(q(byte(x, 1), 1) ^ byte(s[0], 1), 0) ^ byte(s[1], 1), 0);
    let y2 = q(q(q(byte(x, 2), 0) ^ byte(s[0], 2), 1) ^ byte(s[1], 2), 1);
    let y3 = q(q(q(byte(x, 3), 1) ^ byte(s[0], 3), 1) ^ byte(s[1], 3), 0);

    mds_mix(&[y1, y2, y3, y0])
}

#[inline(always)]
fn round_enc(r: &mut [u32; 4], s: &[u32; 2], k0: u32, k1: u32) {
    let t0 = g(r[0], s);
    let t1 = g(r[1].rotate_left(8), s);
    let f0 = t1.wrapping_add(t0).wrapping_add(k0);
    let f1 = (t1 << 1).wrapping_add(t0).wrapping_add(k1);

    *r = [
        (r[2] ^ f0).rotate_right(1),
        r[3].rotate_left(1) ^ f1,
        r[0],
        r[1],
    ];
}

#[inline(always)]
fn round_dec(r: &mut [u32; 4], s: &[u32; 2], k0: u32, k1: u32) {
    let t0 = g(r[0], s);
    let t1 = g(r[1].rotate_left(8), s);
    let f0 = t1.wrapping_add(t0).wrapping_add(k0);
    let f1 = (t1 << 1).wrapping_add(t0).wrapping_add(k1);

    *r = [
        r[2].rotate_left(1) ^ f0,
        (r[3] ^ f1).rotate_right(1),
        r[0],
        r[1],
    ];
}

/// Twofish block cipher with a 128-bit key.
///
/// Holds the expanded key schedule: 40 round subkey words and the two words
/// feeding the key-dependent substitution. Built once per key and read-only
/// afterwards.
#[derive(Clone, Copy)]
pub struct Twofish {
    k: [u32; 40],
    s: [u32; 2],
}

opaque_debug::implement!(Twofish);

impl NewBlockCipher for Twofish {
    type KeySize = U16;

    fn new(key: &Key) -> Self {
        let s = [rs_mix(&key[..8]), rs_mix(&key[8..])];

        let me = [BE::read_u32(&key[8..12]), BE::read_u32(&key[..4])];
        let mo = [BE::read_u32(&key[12..]), BE::read_u32(&key[4..8])];

        let mut k = [0u32; 40];
        for i in 0..20 {
            let x = 2 * i as u32 * RHO;
            let a = g(x, &me);
            let b = g(x + RHO, &mo).rotate_left(8);
            k[2 * i] = a.wrapping_add(b);
            k[2 * i + 1] = a.wrapping_add(b << 1).rotate_left(9);
        }

        Self { k, s }
    }
}

impl BlockCipher for Twofish {
    type BlockSize = U16;
    type ParBlocks = U1;
}

impl BlockEncrypt for Twofish {
    #[inline]
    fn encrypt_block(&self, block: &mut Block) {
        let mut r = [
            BE::read_u32(&block[0..4]) ^ self.k[0],
            BE::read_u32(&block[4..8]) ^ self.k[1],
            BE::read_u32(&block[8..12]) ^ self.k[2],
            BE::read_u32(&block[12..16]) ^ self.k[3],
        ];

        for i in 0..16 {
            round_enc(&mut r, &self.s, self.k[2 * i + 8], self.k[2 * i + 9]);
        }

        // undo the final half swap
        r.swap(0, 2);
        r.swap(1, 3);

        for i in 0..4 {
            BE::write_u32(&mut block[4 * i..4 * i + 4], r[i] ^ self.k[4 + i]);
        }
    }
}

impl BlockDecrypt for Twofish {
    #[inline]
    fn decrypt_block(&self, block: &mut Block) {
        let mut r = [
            BE::read_u32(&block[0..4]) ^ self.k[4],
            BE::read_u32(&block[4..8]) ^ self.k[5],
            BE::read_u32(&block[8..12]) ^ self.k[6],
            BE::read_u32(&block[12..16]) ^ self.k[7],
        ];

        for i in (0..16).rev() {
            round_dec(&mut r, &self.s, self.k[2 * i + 8], self.k[2 * i + 9]);
        }

        // undo the final half swap
        r.swap(0, 2);
        r.swap(1, 3);

        for i in 0..4 {
            BE::write_u32(&mut block[4 * i..4 * i + 4], r[i] ^ self.k[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poly_mul_small_products() {
        assert_eq!(poly_mul(0, 0x5B), 0);
        assert_eq!(poly_mul(1, 0x5B), 0x5B);
        assert_eq!(poly_mul(3, 3), 5);
        assert_eq!(poly_mul(7, 5), 0x1B);
        assert_eq!(poly_mul(0x80, 0x80), 0x4000);
    }

    #[test]
    fn gf_mul_mds_modulus() {
        assert_eq!(gf_mul(0x01, 0x50, MDS_MODULUS), 0x50);
        // x^8 = x^6 + x^5 + x^3 + 1 (mod 0x169)
        assert_eq!(gf_mul(0x02, 0x80, MDS_MODULUS), 0x69);
        assert_eq!(gf_mul(0x04, 0x80, MDS_MODULUS), 0xD2);
    }

    #[test]
    fn gf_mul_rs_modulus() {
        assert_eq!(gf_mul(0x01, 0x9E, RS_MODULUS), 0x9E);
        // x^8 = x^6 + x^3 + x^2 + 1 (mod 0x14D)
        assert_eq!(gf_mul(0x02, 0x80, RS_MODULUS), 0x4D);
        assert_eq!(gf_mul(0x04, 0x80, RS_MODULUS), 0x9A);
    }

    #[test]
    fn moduli_are_distinct_fields() {
        assert_ne!(
            gf_mul(0x02, 0x80, MDS_MODULUS),
            gf_mul(0x02, 0x80, RS_MODULUS)
        );
    }

    #[test]
    fn ror4_rotates_low_nibble() {
        assert_eq!(ror4(0x1), 0x8);
        assert_eq!(ror4(0x8), 0x4);
        assert_eq!(ror4(0x6), 0x3);
        assert_eq!(ror4(0xF), 0xF);
    }

    #[test]
    fn q_variants_are_permutations() {
        for op in 0..2 {
            let mut seen = [false; 256];
            for x in 0..=255u8 {
                let y = q(x, op);
                assert!(!seen[usize::from(y)], "q{} collides at {}", op, x);
                seen[usize::from(y)] = true;
            }
        }
    }

    #[test]
    fn mixing_zero_is_zero() {
        assert_eq!(mds_mix(&[0; 4]), 0);
        assert_eq!(rs_mix(&[0; 8]), 0);
    }

    #[test]
    fn mds_mix_packs_rows_ascending() {
        // unit vector picks out column 0 of the matrix
        assert_eq!(
            mds_mix(&[0x01, 0, 0, 0]),
            u32::from_le_bytes([0x01, 0x5B, 0xEF, 0xEF])
        );
    }
}
