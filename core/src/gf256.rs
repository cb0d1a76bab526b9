//! GF(2^8) arithmetic for the CCSDS Reed-Solomon code
//!
//! Field polynomial x^8 + x^7 + x^2 + x + 1 (0x187), conventional basis.
//! Elements are bytes; exponents live in 0..=254 and 255 doubles as the
//! "log of zero" marker.

const FIELD_POLY: u16 = 0x187;

/// Number of nonzero field elements, the order of the multiplicative group
pub const NN: usize = 255;

/// Sentinel returned by [`log`] for the zero element
pub const LOG_ZERO: u8 = NN as u8;

const fn build_antilog() -> [u8; 256] {
    let mut t = [0u8; 256];
    let mut v: u16 = 1;
    let mut i = 0;
    while i < NN {
        t[i] = v as u8;
        v <<= 1;
        if v & 0x100 != 0 {
            v ^= FIELD_POLY;
        }
        i += 1;
    }
    // alpha^255 would wrap back to 1; the slot is reserved for log(0) instead
    t[NN] = 0;
    t
}

const fn build_log() -> [u8; 256] {
    let antilog = build_antilog();
    let mut t = [LOG_ZERO; 256];
    let mut i = 0;
    while i < NN {
        t[antilog[i] as usize] = i as u8;
        i += 1;
    }
    t
}

static ANTILOG: [u8; 256] = build_antilog();
static LOG: [u8; 256] = build_log();

/// Discrete logarithm of `x`, or [`LOG_ZERO`] when `x == 0`
#[inline(always)]
pub fn log(x: u8) -> u8 {
    LOG[x as usize]
}

/// alpha^e; `antilog(LOG_ZERO)` is 0 so the sentinel maps back to the zero element
#[inline(always)]
pub fn antilog(e: u8) -> u8 {
    ANTILOG[e as usize]
}

/// Reduce an exponent sum modulo 255 without a division
#[inline]
pub fn modnn(mut e: usize) -> usize {
    while e >= NN {
        e -= NN;
        e = (e >> 8) + (e & NN);
    }
    e
}

/// Field multiplication through the log tables
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    ANTILOG[modnn(LOG[a as usize] as usize + LOG[b as usize] as usize)]
}

/// alpha^n for any non-negative n
#[inline]
pub fn pow_alpha(n: usize) -> u8 {
    ANTILOG[modnn(n)]
}
