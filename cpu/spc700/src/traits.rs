/// Interface between the SPC700 core and the 64KB address space it runs in.
///
/// The APU decides what each address resolves to (audio RAM, the I/O window
/// at $F0-$FF, or the boot ROM overlay at $FFC0-$FFFF).
pub trait BusInterface {
    fn read(&mut self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);
}
