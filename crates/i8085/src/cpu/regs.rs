use std::fmt;

/// Register file for the Intel 8085.
///
/// The seven 8-bit registers are stored individually; the pairs BC, DE and HL
/// are views composed on demand, high register in bits 8-15.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            a: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0xFFFF,
            pc: 0x0000,
        }
    }
}

/// One of the seven scalar 8-bit registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// A register pair addressed as a single 16-bit value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterPair {
    BC,
    DE,
    HL,
}

impl Registers {
    #[inline]
    pub fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
        }
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u8) {
        match reg {
            Register::A => self.a = value,
            Register::B => self.b = value,
            Register::C => self.c = value,
            Register::D => self.d = value,
            Register::E => self.e = value,
            Register::H => self.h = value,
            Register::L => self.l = value,
        }
    }

    #[inline]
    pub fn pair(&self, rp: RegisterPair) -> u16 {
        match rp {
            RegisterPair::BC => self.bc(),
            RegisterPair::DE => self.de(),
            RegisterPair::HL => self.hl(),
        }
    }

    #[inline]
    pub fn set_pair(&mut self, rp: RegisterPair, value: u16) {
        match rp {
            RegisterPair::BC => self.set_bc(value),
            RegisterPair::DE => self.set_de(value),
            RegisterPair::HL => self.set_hl(value),
        }
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.b = b;
        self.c = c;
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.d = d;
        self.e = e;
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.h = h;
        self.l = l;
    }
}

impl fmt::Display for Registers {
    /// Two-line register snapshot, e.g.
    /// `A:00 B:00 C:00 D:00 E:00 H:00 L:00` / `SP:FFFF PC:0000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X}\nSP:{:04X} PC:{:04X}",
            self.a, self.b, self.c, self.d, self.e, self.h, self.l, self.sp, self.pc
        )
    }
}

/// Bit positions of the flags inside the PSW byte pushed by `PUSH PSW`.
const PSW_S: u8 = 0x80;
const PSW_Z: u8 = 0x40;
const PSW_AC: u8 = 0x10;
const PSW_P: u8 = 0x04;
const PSW_FIXED: u8 = 0x02;
const PSW_CY: u8 = 0x01;

/// CPU flags for the Intel 8085.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flags {
    pub s: bool,  // sign
    pub z: bool,  // zero
    pub ac: bool, // auxiliary carry
    pub p: bool,  // parity
    pub cy: bool, // carry
}

impl Flags {
    /// Pack the flags into the PSW layout: S Z 0 AC 0 P 1 CY.
    pub fn to_u8(self) -> u8 {
        let mut f = PSW_FIXED;
        if self.s {
            f |= PSW_S;
        }
        if self.z {
            f |= PSW_Z;
        }
        if self.ac {
            f |= PSW_AC;
        }
        if self.p {
            f |= PSW_P;
        }
        if self.cy {
            f |= PSW_CY;
        }
        f
    }

    /// Unpack a PSW byte. Bits 5, 3 and 1 carry no flag and are ignored.
    pub fn from_u8(v: u8) -> Self {
        Self {
            s: (v & PSW_S) != 0,
            z: (v & PSW_Z) != 0,
            ac: (v & PSW_AC) != 0,
            p: (v & PSW_P) != 0,
            cy: (v & PSW_CY) != 0,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S:{} Z:{} AC:{} P:{} CY:{}",
            u8::from(self.s),
            u8::from(self.z),
            u8::from(self.ac),
            u8::from(self.p),
            u8::from(self.cy)
        )
    }
}
