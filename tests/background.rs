use std::collections::HashSet;
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use user_database::{
    AsyncUserRepository, BackgroundRepository, DatabaseHandle, StoreError, StoreResult,
    UserRecord, UserRepository,
};

fn background_repo() -> BackgroundRepository<user_database::SqliteUserRepository> {
    BackgroundRepository::new(DatabaseHandle::open_in_memory().unwrap().repository()).unwrap()
}

#[tokio::test]
async fn test_insert_and_list_off_thread() {
    let users = background_repo();

    let id = users
        .insert(UserRecord::new("Rute", "rute@gmail.com"))
        .await
        .unwrap();

    let all = users.get_all_users().await.unwrap();
    assert_eq!(all, vec![UserRecord::new("Rute", "rute@gmail.com").with_id(id)]);
    assert_eq!(all[0].to_string(), format!("{id}: Rute - rute@gmail.com"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_all_land() {
    let users = background_repo();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let users = users.clone();
            tokio::spawn(async move {
                users
                    .insert(UserRecord::new(format!("user{i}"), format!("u{i}@example.com")))
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 20);
    assert_eq!(users.inner().get_all_users().unwrap().len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_race_keeps_one_row() {
    let users = background_repo();
    let id = users.insert(UserRecord::new("seed", "seed@example.com")).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let users = users.clone();
            tokio::spawn(async move {
                users
                    .insert(UserRecord::new(format!("w{i}"), "race@example.com").with_id(id))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let all = users.get_all_users().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, Some(id));
    assert_eq!(all[0].email, "race@example.com");
}

struct PanickingRepository;

impl UserRepository for PanickingRepository {
    fn insert(&self, _record: &UserRecord) -> StoreResult<i64> {
        panic!("worker crashed");
    }

    fn get_all_users(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_worker_panic_is_task_aborted() {
    let users = BackgroundRepository::new(PanickingRepository).unwrap();

    let err = futures::executor::block_on(users.insert(UserRecord::new("a", "b"))).unwrap_err();
    assert!(matches!(err, StoreError::TaskAborted));

    // The worker keeps serving calls after a job panics.
    let all = futures::executor::block_on(users.get_all_users()).unwrap();
    assert!(all.is_empty());
}

/// Counts calls and remembers which threads served them.
#[derive(Default)]
struct RecordingRepository {
    threads: Mutex<HashSet<ThreadId>>,
    rows: Mutex<Vec<UserRecord>>,
}

impl UserRepository for RecordingRepository {
    fn insert(&self, record: &UserRecord) -> StoreResult<i64> {
        self.threads.lock().unwrap().insert(thread::current().id());
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(record.clone().with_id(id));
        Ok(id)
    }

    fn get_all_users(&self) -> StoreResult<Vec<UserRecord>> {
        self.threads.lock().unwrap().insert(thread::current().id());
        Ok(self.rows.lock().unwrap().clone())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_calls_share_one_worker() {
    const CALLS: usize = 400;
    let users = BackgroundRepository::with_capacity(RecordingRepository::default(), 8).unwrap();

    let tasks: Vec<_> = (0..CALLS)
        .map(|i| {
            let users = users.clone();
            tokio::spawn(async move {
                users
                    .insert(UserRecord::new(format!("user{i}"), "bulk@example.com"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(users.get_all_users().await.unwrap().len(), CALLS);
    let threads = users.inner().threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert!(!threads.contains(&thread::current().id()));
}
