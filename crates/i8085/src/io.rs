//! Port I/O gateway used by the `IN` and `OUT` instructions.

/// Value returned by `IN` when no read handler is installed.
pub const UNCONNECTED_PORT: u8 = 0xFF;

/// Port reserved for bank selection. `OUT` to this port is handled by the CPU
/// itself and never reaches the gateway.
pub const BANK_SELECT_PORT: u8 = 254;

/// Conventional console input port (read side).
pub const CONSOLE_IN_PORT: u8 = 0;
/// Conventional console output port (write side).
pub const CONSOLE_OUT_PORT: u8 = 1;

pub type PortRead = Box<dyn FnMut(u8) -> u8>;
pub type PortWrite = Box<dyn FnMut(u8, u8)>;

/// Two optional callback slots supplied by the embedding application.
///
/// Either slot may be empty: reads then yield [`UNCONNECTED_PORT`] and writes
/// are dropped. Whatever a read handler returns is used verbatim.
///
/// Handlers run synchronously inside `Cpu8085::step` and must not call back
/// into the CPU. Sharing state with the driver goes through something like
/// `Rc<RefCell<_>>` owned by both sides.
#[derive(Default)]
pub struct IoGateway {
    read: Option<PortRead>,
    write: Option<PortWrite>,
}

impl IoGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read(&mut self, handler: impl FnMut(u8) -> u8 + 'static) {
        self.read = Some(Box::new(handler));
    }

    pub fn set_write(&mut self, handler: impl FnMut(u8, u8) + 'static) {
        self.write = Some(Box::new(handler));
    }

    pub fn clear(&mut self) {
        self.read = None;
        self.write = None;
    }

    pub fn has_read(&self) -> bool {
        self.read.is_some()
    }

    pub fn has_write(&self) -> bool {
        self.write.is_some()
    }

    pub fn read(&mut self, port: u8) -> u8 {
        match self.read.as_mut() {
            Some(handler) => handler(port),
            None => UNCONNECTED_PORT,
        }
    }

    pub fn write(&mut self, port: u8, value: u8) {
        if let Some(handler) = self.write.as_mut() {
            handler(port, value);
        }
    }
}
