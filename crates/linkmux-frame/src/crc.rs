//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, MSB-first, no final xor).
//!
//! A fixed constant of the protocol, shared identically by both ends of the
//! link. Because there is no output reflection or final xor, a packet with
//! its big-endian checksum appended re-CRCs to zero — which is how received
//! packets are validated.

/// Compute the checksum over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ccitt_false_check_value() {
        // Standard check input for CRC-16/CCITT-FALSE.
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn empty_input_yields_init_value() {
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn residue_is_zero_with_appended_checksum() {
        let mut data = b"PUSH hello.txt\n".to_vec();
        let crc = crc16(&data);
        data.push((crc >> 8) as u8);
        data.push(crc as u8);
        assert_eq!(crc16(&data), 0);
    }

    #[test]
    fn single_bit_flip_changes_checksum() {
        let data = b"some packet bytes";
        let reference = crc16(data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data.to_vec();
                flipped[i] ^= 1 << bit;
                assert_ne!(crc16(&flipped), reference, "flip at byte {i} bit {bit}");
            }
        }
    }
}
