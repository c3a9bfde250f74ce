//! Bootloader unlock and FRP wipe over the command channel.
//!
//! Both flows run once stage 0 has finished and the device has rebooted
//! into the uploaded fastboot loader.
//!
//! Unlocking replaces the bootloader unlock code stored in NV memory:
//!
//! 1. `getvar:nve:WVLOCK` reads the current (stock) code, if any
//! 2. `getvar:nve:WVLOCK@<code>` stores a freshly generated code
//! 3. `getvar:nve:USRKEY@<sha256(code)>` stores its digest
//! 4. `getvar:nve:FBLOCK@00` clears the fastboot lock

use crate::error::Result;
use crate::fastboot::CommandChannel;
use log::info;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of an unlock code.
pub const UNLOCK_CODE_LEN: usize = 16;

const UNLOCK_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Keys seen and written by [`unlock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// Code found on the device before unlocking.
    pub stock_key: Option<String>,
    /// Code written to the device.
    pub new_key: String,
}

/// Generate a random unlock code of uppercase letters and digits.
pub fn generate_unlock_code<R: Rng>(rng: &mut R) -> String {
    (0..UNLOCK_CODE_LEN)
        .map(|_| char::from(UNLOCK_CHARSET[rng.gen_range(0..UNLOCK_CHARSET.len())]))
        .collect()
}

/// Lowercase hex SHA-256 of `code`.
pub fn usrkey_hash(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.as_bytes()))
}

fn is_code_char(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit()
}

/// First run of 16 uppercase letters or digits in `output`.
pub fn find_stock_key(output: &str) -> Option<String> {
    output
        .as_bytes()
        .windows(UNLOCK_CODE_LEN)
        .find(|w| w.iter().copied().all(is_code_char))
        .map(|w| String::from_utf8_lossy(w).into_owned())
}

/// Replace the unlock code and clear the fastboot lock.
pub fn unlock<C, R>(channel: &mut C, rng: &mut R) -> Result<UnlockOutcome>
where
    C: CommandChannel + ?Sized,
    R: Rng,
{
    let output = channel.run("getvar:nve:WVLOCK")?;
    let stock_key = find_stock_key(&output);
    match &stock_key {
        Some(key) => info!("Stock key: {key}"),
        None => info!("No stock key found"),
    }

    let new_key = generate_unlock_code(rng);
    info!("New unlock key: {new_key}");

    channel.run(&format!("getvar:nve:WVLOCK@{new_key}"))?;
    channel.run(&format!("getvar:nve:USRKEY@{}", usrkey_hash(&new_key)))?;
    channel.run("getvar:nve:FBLOCK@00")?;

    Ok(UnlockOutcome { stock_key, new_key })
}

/// Erase factory reset protection data.
pub fn wipe_frp<C: CommandChannel + ?Sized>(channel: &mut C) -> Result<()> {
    info!("Wiping FRP data...");
    channel.run("oem frp-erase")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Default)]
    struct RecordingChannel {
        commands: Vec<String>,
        wvlock: String,
        fail_on: Option<&'static str>,
    }

    impl CommandChannel for RecordingChannel {
        fn run(&mut self, command: &str) -> Result<String> {
            self.commands.push(command.to_string());
            if self.fail_on.is_some_and(|c| command.starts_with(c)) {
                return Err(Error::CommandChannel("device went away".into()));
            }
            if command == "getvar:nve:WVLOCK" {
                Ok(self.wvlock.clone())
            } else {
                Ok("OKAY\n".into())
            }
        }
    }

    #[test]
    fn test_generate_unlock_code() {
        let mut rng = StdRng::seed_from_u64(7);
        let code = generate_unlock_code(&mut rng);
        assert_eq!(code.len(), UNLOCK_CODE_LEN);
        assert!(code.bytes().all(is_code_char));
        assert_ne!(code, generate_unlock_code(&mut rng));
    }

    #[test]
    fn test_usrkey_hash() {
        assert_eq!(
            usrkey_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_find_stock_key() {
        assert_eq!(
            find_stock_key("(bootloader) nve:WVLOCK: 0123456789ABCDEF\nOKAY"),
            Some("0123456789ABCDEF".to_string())
        );
        // Leftmost match wins inside a longer run.
        assert_eq!(
            find_stock_key("ZZ0123456789ABCDEF"),
            Some("ZZ0123456789ABCD".to_string())
        );
        assert_eq!(find_stock_key("FAILED (remote: 'not allowed')"), None);
        assert_eq!(find_stock_key("0123456789abcdef"), None);
    }

    #[test]
    fn test_unlock_sequence() {
        let mut channel = RecordingChannel {
            wvlock: "nve:WVLOCK: AAAABBBBCCCCDDDD\n".into(),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = unlock(&mut channel, &mut rng).unwrap();

        assert_eq!(outcome.stock_key.as_deref(), Some("AAAABBBBCCCCDDDD"));
        assert_eq!(
            channel.commands,
            vec![
                "getvar:nve:WVLOCK".to_string(),
                format!("getvar:nve:WVLOCK@{}", outcome.new_key),
                format!("getvar:nve:USRKEY@{}", usrkey_hash(&outcome.new_key)),
                "getvar:nve:FBLOCK@00".to_string(),
            ]
        );
    }

    #[test]
    fn test_unlock_without_stock_key() {
        let mut channel = RecordingChannel::default();
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = unlock(&mut channel, &mut rng).unwrap();
        assert_eq!(outcome.stock_key, None);
        assert_eq!(channel.commands.len(), 4);
    }

    #[test]
    fn test_unlock_stops_on_channel_error() {
        let mut channel = RecordingChannel {
            fail_on: Some("getvar:nve:USRKEY@"),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        assert!(matches!(
            unlock(&mut channel, &mut rng),
            Err(Error::CommandChannel(_))
        ));
        assert_eq!(channel.commands.len(), 3);
    }

    #[test]
    fn test_wipe_frp() {
        let mut channel = RecordingChannel::default();
        wipe_frp(&mut channel).unwrap();
        assert_eq!(channel.commands, vec!["oem frp-erase"]);
    }
}
