//! Anonymous device identity used to scope every remote record.

use rand::{rngs::OsRng, Rng};

use crate::db::{LocalStore, StorageKey};

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Return the stored device id, generating and persisting one on first use.
pub async fn get_or_create_device_id(store: &LocalStore) -> String {
    if let Some(existing) = store.get_optional::<String>(StorageKey::DeviceId).await {
        if !existing.is_empty() {
            return existing;
        }
    }

    let device_id = generate_device_id();
    store.set(StorageKey::DeviceId, &device_id).await;

    tracing::info!("Generated new device id: {}", device_id);
    device_id
}

fn generate_device_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[OsRng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("device_{}_{}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_device_id_is_stable() {
        let store = LocalStore::new(Arc::new(Database::in_memory().await.unwrap()));

        let first = get_or_create_device_id(&store).await;
        let second = get_or_create_device_id(&store).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_device_id_is_reused() {
        let store = LocalStore::new(Arc::new(Database::in_memory().await.unwrap()));
        store.set(StorageKey::DeviceId, &"device_1_abc").await;

        assert_eq!(get_or_create_device_id(&store).await, "device_1_abc");
    }

    #[test]
    fn test_generated_format() {
        let id = generate_device_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_device_id(), generate_device_id());
    }
}
