use std::sync::Arc;

use crate::config::Config;
use crate::engine::{BookingService, RoomLocks, RoomService};
use crate::repository::{BookingRepository, RoomRepository, UserDirectory, UserRepository};
use crate::store::IndexedStore;

/// Wires store → repositories → services once. Hand out clones of the
/// services; they share everything underneath.
#[derive(Clone)]
pub struct AppRegistry {
    store: Arc<IndexedStore>,
    users: UserRepository,
    bookings: BookingService,
    rooms: RoomService,
}

impl AppRegistry {
    pub fn new(store: Arc<IndexedStore>, config: &Config) -> Self {
        let users = UserRepository::new(store.clone());
        let directory: Arc<dyn UserDirectory> = Arc::new(users.clone());
        Self::with_directory(store, config, users, directory)
    }

    /// Same wiring with a caller-supplied user directory, for deployments
    /// where accounts live outside this store.
    pub fn with_directory(
        store: Arc<IndexedStore>,
        config: &Config,
        users: UserRepository,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let booking_repo = BookingRepository::new(store.clone());
        let room_repo = RoomRepository::new(store.clone());
        let locks = Arc::new(RoomLocks::new());

        let bookings = BookingService::new(
            booking_repo.clone(),
            room_repo.clone(),
            directory,
            locks.clone(),
            config.max_booking_days,
        );
        let rooms = RoomService::new(room_repo, booking_repo, locks);

        Self {
            store,
            users,
            bookings,
            rooms,
        }
    }

    pub fn store(&self) -> &Arc<IndexedStore> {
        &self.store
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn bookings(&self) -> &BookingService {
        &self.bookings
    }

    pub fn rooms(&self) -> &RoomService {
        &self.rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomDraft;

    #[tokio::test]
    async fn services_share_state() {
        let config = Config { max_booking_days: 3, ..Config::default() };
        let registry = AppRegistry::new(Arc::new(IndexedStore::in_memory()), &config);
        assert_eq!(registry.bookings().max_booking_days(), 3);

        let clone = registry.clone();
        let room = registry
            .rooms()
            .add_room(RoomDraft {
                name: "Atrium".into(),
                room_number: 1,
                capacity: 40,
                floor: 0,
                location: "Lobby".into(),
                ..RoomDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(clone.rooms().get_room_by_id(&room.id).unwrap().name, "Atrium");
        assert_eq!(clone.store().count(crate::model::RecordType::Room), 1);
    }
}
