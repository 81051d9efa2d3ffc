//! Cross-layer crypto properties: the key hierarchy end to end.

use obsec_core::crypto::{
    blob, derive_file_key, derive_master_key, derive_vault_key,
};

const SALT: [u8; 16] = *b"0123456789abcdef";
const VAULT_ID: [u8; 16] = [0xA1; 16];
const FILE_ID: [u8; 16] = [0xB2; 16];

#[test]
fn full_hierarchy_round_trip() {
    let master = derive_master_key("a sufficiently long password", &SALT).unwrap();
    let vault_key = derive_vault_key(&master, &VAULT_ID);
    let file_key = derive_file_key(&vault_key, &FILE_ID);

    let sealed = blob::seal(file_key.secret(), b"note body\n", None).unwrap();

    // Re-derive the whole chain from scratch and decrypt.
    let master2 = derive_master_key("a sufficiently long password", &SALT).unwrap();
    let vault_key2 = derive_vault_key(&master2, &VAULT_ID);
    let file_key2 = derive_file_key(&vault_key2, &FILE_ID);
    let plain = blob::open(file_key2.secret(), &sealed).unwrap();
    assert_eq!(&plain[..], b"note body\n");
}

#[test]
fn sibling_file_keys_cannot_read_each_others_blobs() {
    let master = derive_master_key("a sufficiently long password", &SALT).unwrap();
    let vault_key = derive_vault_key(&master, &VAULT_ID);
    let key_a = derive_file_key(&vault_key, &[0x01; 16]);
    let key_b = derive_file_key(&vault_key, &[0x02; 16]);

    let sealed = blob::seal(key_a.secret(), b"private to a", None).unwrap();
    assert!(blob::open(key_b.secret(), &sealed).is_err());
}

#[test]
fn vault_id_binds_the_key_hierarchy() {
    // Same password and salt, different vault: ciphertext cannot be
    // transplanted between vaults.
    let master = derive_master_key("a sufficiently long password", &SALT).unwrap();
    let key_v1 = derive_file_key(&derive_vault_key(&master, &[0x11; 16]), &FILE_ID);
    let key_v2 = derive_file_key(&derive_vault_key(&master, &[0x22; 16]), &FILE_ID);

    let sealed = blob::seal(key_v1.secret(), b"vault one data", None).unwrap();
    assert!(blob::open(key_v2.secret(), &sealed).is_err());
}
