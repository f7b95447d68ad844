//! Flow-control demultiplexer: strips embedded XON/XOFF from a byte
//! buffer read off the controlling terminal, updating the
//! transmit-ok flag in place. Does not generate XON/XOFF toward the
//! child — the child's own PTY flow control is independent.

use crate::device_state::{XOFF, XON};

/// Compacts `buf` in place, removing XON/XOFF bytes and returning the
/// number of bytes that remain. `transmit_ok` is updated as each
/// XON/XOFF is seen; the last one in the buffer wins.
pub fn demultiplex(buf: &mut [u8], transmit_ok: &mut bool) -> usize {
    let mut write_idx = 0;
    for read_idx in 0..buf.len() {
        let byte = buf[read_idx];
        match byte {
            XON => *transmit_ok = true,
            XOFF => *transmit_ok = false,
            _ => {
                buf[write_idx] = byte;
                write_idx += 1;
            }
        }
    }
    write_idx
}
