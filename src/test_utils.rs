use rand::Rng;

use crate::types::Address;

pub fn create_random_address() -> Address {
    Address::from_bytes(rand::thread_rng().gen())
}
