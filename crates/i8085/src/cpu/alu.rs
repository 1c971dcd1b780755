//! 8085 arithmetic/logic unit.
//!
//! Every function here is pure with respect to its explicit inputs: the
//! accumulator (or operand) is passed by value, flags by `&mut Flags`, and the
//! result is returned. Nothing reads or writes the register file directly.

use super::Flags;

/// Set Z, S and P from an 8-bit result. CY and AC are left alone.
#[inline]
pub fn update_flags_arithmetic(result: u8, flags: &mut Flags) {
    flags.z = result == 0;
    flags.s = (result & 0x80) != 0;
    flags.p = result.count_ones() % 2 == 0;
}

/// Set Z, S and P from an 8-bit result and clear CY and AC.
#[inline]
pub fn update_flags_logical(result: u8, flags: &mut Flags) {
    update_flags_arithmetic(result, flags);
    flags.cy = false;
    flags.ac = false;
}

/// 8-bit ADD/ADC.
///
/// AC is derived after CY has already been updated, so with `with_carry` the
/// nibble check adds the *outgoing* carry rather than the incoming one.
pub fn add(acc: u8, value: u8, with_carry: bool, flags: &mut Flags) -> u8 {
    let carry_in = u16::from(with_carry && flags.cy);
    let full = u16::from(acc) + u16::from(value) + carry_in;
    flags.cy = full > 0xFF;

    let nibble_carry = u8::from(with_carry && flags.cy);
    flags.ac = (acc & 0x0F) + (value & 0x0F) + nibble_carry > 0x0F;

    let result = full as u8;
    update_flags_arithmetic(result, flags);
    result
}

/// 8-bit SUB/SBB. CY reports a borrow, AC a borrow out of the low nibble.
///
/// Same ordering quirk as [`add`]: the nibble borrow of SBB uses the updated
/// CY.
pub fn sub(acc: u8, value: u8, with_borrow: bool, flags: &mut Flags) -> u8 {
    let borrow_in = i16::from(with_borrow && flags.cy);
    let full = i16::from(acc) - i16::from(value) - borrow_in;
    flags.cy = full < 0;

    let nibble_borrow = u8::from(with_borrow && flags.cy);
    flags.ac = (acc & 0x0F) < (value & 0x0F) + nibble_borrow;

    let result = full as u8;
    update_flags_arithmetic(result, flags);
    result
}

/// Compare: flags as for `acc - value`, result discarded.
#[inline]
pub fn cmp(acc: u8, value: u8, flags: &mut Flags) {
    sub(acc, value, false, flags);
}

#[inline]
pub fn and(acc: u8, value: u8, flags: &mut Flags) -> u8 {
    let result = acc & value;
    update_flags_logical(result, flags);
    result
}

#[inline]
pub fn or(acc: u8, value: u8, flags: &mut Flags) -> u8 {
    let result = acc | value;
    update_flags_logical(result, flags);
    result
}

#[inline]
pub fn xor(acc: u8, value: u8, flags: &mut Flags) -> u8 {
    let result = acc ^ value;
    update_flags_logical(result, flags);
    result
}

/// INR: Z/S/P only. CY is not affected.
#[inline]
pub fn inr(value: u8, flags: &mut Flags) -> u8 {
    let result = value.wrapping_add(1);
    update_flags_arithmetic(result, flags);
    result
}

/// DCR: Z/S/P only. CY is not affected.
#[inline]
pub fn dcr(value: u8, flags: &mut Flags) -> u8 {
    let result = value.wrapping_sub(1);
    update_flags_arithmetic(result, flags);
    result
}

/// DAD: 16-bit add into HL, CY set when the sum wraps past 0xFFFF.
#[inline]
pub fn dad(hl: u16, value: u16, flags: &mut Flags) -> u16 {
    let (result, carry) = hl.overflowing_add(value);
    flags.cy = carry;
    result
}

/// Decimal adjust accumulator. AC is read but not updated.
pub fn daa(acc: u8, flags: &mut Flags) -> u8 {
    let low = acc & 0x0F;
    let high = acc >> 4;
    let mut correction = 0u8;

    if low > 9 || flags.ac {
        correction |= 0x06;
    }
    if high > 9 || flags.cy || (high >= 9 && low > 9) {
        correction |= 0x60;
        flags.cy = true;
    }

    let result = acc.wrapping_add(correction);
    update_flags_arithmetic(result, flags);
    result
}

/// RLC: rotate left, bit 7 into CY and bit 0.
#[inline]
pub fn rlc(acc: u8, flags: &mut Flags) -> u8 {
    flags.cy = (acc & 0x80) != 0;
    acc.rotate_left(1)
}

/// RRC: rotate right, bit 0 into CY and bit 7.
#[inline]
pub fn rrc(acc: u8, flags: &mut Flags) -> u8 {
    flags.cy = (acc & 0x01) != 0;
    acc.rotate_right(1)
}

/// RAL: rotate left through carry.
#[inline]
pub fn ral(acc: u8, flags: &mut Flags) -> u8 {
    let carry = u8::from(flags.cy);
    flags.cy = (acc & 0x80) != 0;
    (acc << 1) | carry
}

/// RAR: rotate right through carry.
#[inline]
pub fn rar(acc: u8, flags: &mut Flags) -> u8 {
    let carry = if flags.cy { 0x80 } else { 0 };
    flags.cy = (acc & 0x01) != 0;
    (acc >> 1) | carry
}
