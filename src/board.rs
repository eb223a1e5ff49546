//! Status board controller.
//!
//! `Board` is the session's task list with the four status columns derived from it.
//! It is owned by a single worker task; callers hold a cloneable [`BoardHandle`] and
//! send it commands. Commands are processed one at a time in arrival order, each
//! going through the gateway first and touching the local list only once the store
//! has accepted the change.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::fields::Status;
use crate::gateway::{GatewayError, TaskGateway};
use crate::store::TaskStore;
use crate::task::{Subtask, Task, TaskChanges, TaskDraft, TaskId};

const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("board worker has stopped")]
    Closed,
}

/// The session's tasks, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    tasks: Vec<Task>,
}

impl Board {
    pub fn new(tasks: Vec<Task>) -> Self {
        Board { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in one column, in board order.
    pub fn column(&self, status: Status) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn columns(&self) -> [(Status, Vec<&Task>); 4] {
        Status::ALL.map(|s| (s, self.column(s)))
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Find a task by exact id, unique id prefix, or case-insensitive title.
    /// Ambiguous titles list the candidates so the caller can pick an id.
    pub fn resolve(&self, ident: &str) -> Result<&Task, String> {
        let ident = ident.trim();
        if let Some(task) = self.tasks.iter().find(|t| t.id.as_str() == ident) {
            return Ok(task);
        }
        let by_prefix: Vec<&Task> = self.tasks.iter().filter(|t| t.id.as_str().starts_with(ident)).collect();
        if by_prefix.len() == 1 && ident.len() >= 4 {
            return Ok(by_prefix[0]);
        }

        let wanted = ident.to_lowercase();
        let matches: Vec<&Task> = self.tasks.iter().filter(|t| t.title.to_lowercase() == wanted).collect();
        match matches.len() {
            0 => Err(format!("No task found with id or title '{ident}'")),
            1 => Ok(matches[0]),
            _ => {
                let mut msg = format!("Multiple tasks found with title '{ident}':\n");
                for task in matches {
                    msg.push_str(&format!("  {} ({}, {})\n", task.id, task.status.label(), task.assignee.name()));
                }
                msg.push_str("Please use the id instead.");
                Err(msg)
            }
        }
    }

    fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// The mutators below take the `updated_at` the store was given, so the
    /// local copy matches the row without a reload.
    pub fn set_status(&mut self, id: &TaskId, status: Status, updated_at: DateTime<Utc>) -> bool {
        self.merge(id, |t| t.status = status, updated_at)
    }

    pub fn set_subtasks(&mut self, id: &TaskId, subtasks: Vec<Subtask>, updated_at: DateTime<Utc>) -> bool {
        self.merge(id, |t| t.subtasks = subtasks, updated_at)
    }

    pub fn apply_changes(&mut self, id: &TaskId, changes: &TaskChanges, updated_at: DateTime<Utc>) -> bool {
        self.merge(id, |t| changes.apply_to(t), updated_at)
    }

    fn merge(&mut self, id: &TaskId, change: impl FnOnce(&mut Task), updated_at: DateTime<Utc>) -> bool {
        match self.get_mut(id) {
            Some(t) => {
                change(t);
                t.updated_at = Some(updated_at);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| &t.id != id);
        self.tasks.len() != before
    }

    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn push_front(&mut self, task: Task) {
        self.tasks.insert(0, task);
    }
}

type Reply<T> = oneshot::Sender<Result<T, BoardError>>;

enum BoardCommand {
    Reload { reply: Reply<usize> },
    Create { draft: TaskDraft, reply: Reply<Task> },
    CycleStatus { id: TaskId, reply: Reply<Option<Status>> },
    ToggleSubtask { id: TaskId, index: usize, reply: Reply<Option<bool>> },
    Edit { id: TaskId, changes: TaskChanges, reply: Reply<bool> },
    Delete { id: TaskId, reply: Reply<bool> },
    Snapshot { reply: oneshot::Sender<Board> },
}

impl std::fmt::Debug for BoardCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BoardCommand::Reload { .. } => "Reload",
            BoardCommand::Create { .. } => "Create",
            BoardCommand::CycleStatus { .. } => "CycleStatus",
            BoardCommand::ToggleSubtask { .. } => "ToggleSubtask",
            BoardCommand::Edit { .. } => "Edit",
            BoardCommand::Delete { .. } => "Delete",
            BoardCommand::Snapshot { .. } => "Snapshot",
        };
        f.write_str(name)
    }
}

struct BoardActor<S> {
    gateway: TaskGateway<S>,
    board: Board,
    receiver: mpsc::Receiver<BoardCommand>,
}

impl<S: TaskStore + 'static> BoardActor<S> {
    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            self.handle(command).await;
        }
        tracing::debug!("board worker stopped");
    }

    async fn handle(&mut self, command: BoardCommand) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            BoardCommand::Reload { reply } => {
                let _ = reply.send(self.reload().await);
            }
            BoardCommand::Create { draft, reply } => {
                let _ = reply.send(self.create(draft).await);
            }
            BoardCommand::CycleStatus { id, reply } => {
                let _ = reply.send(self.cycle_status(&id).await);
            }
            BoardCommand::ToggleSubtask { id, index, reply } => {
                let _ = reply.send(self.toggle_subtask(&id, index).await);
            }
            BoardCommand::Edit { id, changes, reply } => {
                let _ = reply.send(self.edit(&id, changes).await);
            }
            BoardCommand::Delete { id, reply } => {
                let _ = reply.send(self.delete(&id).await);
            }
            BoardCommand::Snapshot { reply } => {
                let _ = reply.send(self.board.clone());
            }
        }
    }

    async fn reload(&mut self) -> Result<usize, BoardError> {
        let tasks = self.gateway.list().await?;
        self.board.replace_all(tasks);
        Ok(self.board.len())
    }

    async fn create(&mut self, draft: TaskDraft) -> Result<Task, BoardError> {
        let task = self.gateway.create(draft).await?;
        if let Err(e) = self.reload().await {
            tracing::warn!(task_id = %task.id, error = %e, "reload after create failed, keeping local copy");
            self.board.push_front(task.clone());
        }
        Ok(task)
    }

    async fn cycle_status(&mut self, id: &TaskId) -> Result<Option<Status>, BoardError> {
        let next = match self.board.get(id) {
            Some(task) => task.status.next(),
            None => {
                tracing::debug!(task_id = %id, "cycle ignored, task not on board");
                return Ok(None);
            }
        };
        let updated_at = self.gateway.update_status(id, next).await?;
        self.board.set_status(id, next, updated_at);
        Ok(Some(next))
    }

    async fn toggle_subtask(&mut self, id: &TaskId, index: usize) -> Result<Option<bool>, BoardError> {
        let Some(task) = self.board.get(id) else {
            return Ok(None);
        };
        let mut subtasks = task.subtasks.clone();
        let Some(subtask) = subtasks.get_mut(index) else {
            tracing::debug!(task_id = %id, index, "toggle ignored, no such subtask");
            return Ok(None);
        };
        subtask.completed = !subtask.completed;
        let completed = subtask.completed;

        let updated_at = self.gateway.update_subtasks(id, &subtasks).await?;
        self.board.set_subtasks(id, subtasks, updated_at);
        Ok(Some(completed))
    }

    async fn edit(&mut self, id: &TaskId, changes: TaskChanges) -> Result<bool, BoardError> {
        if changes.is_empty() || self.board.get(id).is_none() {
            return Ok(false);
        }
        let updated_at = self.gateway.update(id, &changes).await?;
        Ok(self.board.apply_changes(id, &changes, updated_at))
    }

    async fn delete(&mut self, id: &TaskId) -> Result<bool, BoardError> {
        self.gateway.delete(id).await?;
        Ok(self.board.remove(id))
    }
}

/// Cloneable handle to the board worker.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    sender: mpsc::Sender<BoardCommand>,
}

impl BoardHandle {
    /// Start a worker owning an empty board. Must be called inside a tokio runtime.
    pub fn spawn<S: TaskStore + 'static>(gateway: TaskGateway<S>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        let actor = BoardActor {
            gateway,
            board: Board::default(),
            receiver,
        };
        tokio::spawn(actor.run());
        BoardHandle { sender }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> BoardCommand) -> Result<T, BoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .map_err(|_| BoardError::Closed)?;
        rx.await.map_err(|_| BoardError::Closed)
    }

    /// Replace the board with the store's current tasks. Returns the task count.
    pub async fn reload(&self) -> Result<usize, BoardError> {
        self.request(|reply| BoardCommand::Reload { reply }).await?
    }

    pub async fn create(&self, draft: TaskDraft) -> Result<Task, BoardError> {
        self.request(|reply| BoardCommand::Create { draft, reply }).await?
    }

    /// Move a task to the next column. `None` when the task is not on the board.
    pub async fn cycle_status(&self, id: TaskId) -> Result<Option<Status>, BoardError> {
        self.request(|reply| BoardCommand::CycleStatus { id, reply }).await?
    }

    /// Flip one subtask. Returns its new state, or `None` if there is nothing at
    /// that position.
    pub async fn toggle_subtask(&self, id: TaskId, index: usize) -> Result<Option<bool>, BoardError> {
        self.request(|reply| BoardCommand::ToggleSubtask { id, index, reply }).await?
    }

    /// Apply an edit. `false` when the task is not on the board or nothing changed.
    pub async fn edit_task(&self, id: TaskId, changes: TaskChanges) -> Result<bool, BoardError> {
        self.request(|reply| BoardCommand::Edit { id, changes, reply }).await?
    }

    /// Delete through the gateway; `true` when a local task was removed.
    pub async fn delete_task(&self, id: TaskId) -> Result<bool, BoardError> {
        self.request(|reply| BoardCommand::Delete { id, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<Board, BoardError> {
        self.request(|reply| BoardCommand::Snapshot { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::store::{LocalStore, StoreError, StoreOp};
    use crate::task::{avatar_url_for, encode_uri_component, DueRange, NewTaskRow, TaskRow};
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    #[fixture]
    fn store() -> Arc<LocalStore> {
        Arc::new(LocalStore::in_memory())
    }

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: "Draft the design doc".to_string(),
            priority: "high".to_string(),
            status: None,
            due_date: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
            assignee_name: "Ada".to_string(),
            subtasks: vec![Subtask::new("outline"), Subtask::new("review")],
            ..TaskDraft::default()
        }
    }

    fn new_row(title: &str) -> NewTaskRow {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        NewTaskRow {
            title: title.to_string(),
            description: "d".to_string(),
            priority: Priority::Medium,
            status: Status::Todo,
            due_date: at,
            estimated_time: None,
            assignee_name: "Ada".to_string(),
            assignee_avatar: avatar_url_for("Ada"),
            ai_insights: String::new(),
            tags: vec![],
            subtasks: vec![],
            user_id: "anonymous".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    async fn board_with_task(store: &Arc<LocalStore>) -> (BoardHandle, Task) {
        let handle = BoardHandle::spawn(TaskGateway::new(store.clone()));
        let task = handle.create(draft("Write spec")).await.unwrap();
        (handle, task)
    }

    #[test]
    fn resolve_by_id_prefix_or_title() {
        let mut a = Task::from_row(TaskRow::from_new("abcd1234", &new_row("Write spec")));
        let b = Task::from_row(TaskRow::from_new("abcd9999", &new_row("write SPEC")));
        let c = Task::from_row(TaskRow::from_new("ffff0000", &new_row("Review")));
        a.status = Status::Done;
        let board = Board::new(vec![a, b, c]);

        assert_eq!(board.resolve("abcd9999").unwrap().id.as_str(), "abcd9999");
        assert_eq!(board.resolve("ffff").unwrap().title, "Review");
        assert_eq!(board.resolve("review").unwrap().id.as_str(), "ffff0000");
        let err = board.resolve("Write Spec").unwrap_err();
        assert!(err.contains("abcd1234") && err.contains("abcd9999"));
        // "abcd" is a prefix of two ids and the title of none.
        assert!(board.resolve("abcd").is_err());
        assert!(board.resolve("nothing").is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn create_places_task_in_todo(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.assignee.name(), "Ada");
        assert!(task.assignee.avatar_url().ends_with(&encode_uri_component("Ada")));

        let board = handle.snapshot().await.unwrap();
        let columns = board.columns();
        assert_eq!(columns[0].0, Status::Todo);
        assert_eq!(columns[0].1.len(), 1);
        assert!(columns[1..].iter().all(|(_, tasks)| tasks.is_empty()));
    }

    #[rstest]
    #[tokio::test]
    async fn cycling_moves_through_columns_and_persists(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        for expected in [Status::InProgress, Status::InReview, Status::Done, Status::Todo] {
            assert_eq!(handle.cycle_status(task.id.clone()).await.unwrap(), Some(expected));
            let board = handle.snapshot().await.unwrap();
            assert_eq!(board.column(expected).len(), 1);
        }
        let row = store.row(&task.id).await.unwrap();
        assert_eq!(row.status.as_deref(), Some("todo"));
    }

    #[rstest]
    #[tokio::test]
    async fn queued_cycles_each_see_the_previous_result(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        let other = handle.clone();
        let (a, b) = tokio::join!(
            handle.cycle_status(task.id.clone()),
            other.cycle_status(task.id.clone())
        );
        let mut seen = vec![a.unwrap().unwrap(), b.unwrap().unwrap()];
        seen.sort_by_key(|s| s.column_index());
        assert_eq!(seen, [Status::InProgress, Status::InReview]);
        let board = handle.snapshot().await.unwrap();
        assert_eq!(board.get(&task.id).unwrap().status, Status::InReview);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_ids_are_ignored_without_store_calls(store: Arc<LocalStore>) {
        let (handle, _) = board_with_task(&store).await;
        let calls = store.calls();
        let ghost = TaskId::from("missing");
        assert_eq!(handle.cycle_status(ghost.clone()).await.unwrap(), None);
        assert_eq!(handle.toggle_subtask(ghost.clone(), 0).await.unwrap(), None);
        assert!(!handle.edit_task(ghost, TaskChanges { title: Some("x".into()), ..Default::default() }).await.unwrap());
        assert_eq!(store.calls(), calls);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_mutation_leaves_board_unchanged(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        let before = handle.snapshot().await.unwrap();
        store.fail_next(StoreError::new("42501", "permission denied")).await;
        let err = handle.cycle_status(task.id.clone()).await.unwrap_err();
        assert!(matches!(err, BoardError::Gateway(GatewayError::Store(_))));
        assert_eq!(handle.snapshot().await.unwrap(), before);
    }

    #[rstest]
    #[tokio::test]
    async fn toggling_a_subtask_twice_restores_it(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        assert_eq!(handle.toggle_subtask(task.id.clone(), 1).await.unwrap(), Some(true));
        let row = store.row(&task.id).await.unwrap();
        assert!(row.subtasks.unwrap()[1].completed);

        assert_eq!(handle.toggle_subtask(task.id.clone(), 1).await.unwrap(), Some(false));
        assert_eq!(handle.toggle_subtask(task.id.clone(), 9).await.unwrap(), None);
        let board = handle.snapshot().await.unwrap();
        assert_eq!(board.get(&task.id).unwrap().subtasks, task.subtasks);
    }

    #[rstest]
    #[tokio::test]
    async fn edit_merges_and_rederives_avatar(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        let due = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let changes = TaskChanges {
            priority: Some(Priority::Low),
            assignee: Some("Grace Hopper".to_string()),
            due: Some(DueRange::new(due, Some(due + chrono::Duration::days(2)))),
            ..TaskChanges::default()
        };
        assert!(handle.edit_task(task.id.clone(), changes).await.unwrap());

        let board = handle.snapshot().await.unwrap();
        let edited = board.get(&task.id).unwrap();
        assert_eq!(edited.priority, Priority::Low);
        assert_eq!(edited.assignee.avatar_url(), avatar_url_for("Grace Hopper"));
        assert_eq!(edited.due_date, due);
        assert_eq!(edited.title, task.title);

        handle.reload().await.unwrap();
        let reloaded = handle.snapshot().await.unwrap();
        assert_eq!(reloaded.get(&task.id).unwrap().assignee, edited.assignee);
    }

    #[rstest]
    #[tokio::test]
    async fn local_updated_at_follows_the_store(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        let created_stamp = task.updated_at.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        handle.cycle_status(task.id.clone()).await.unwrap();
        let after_cycle = handle.snapshot().await.unwrap().get(&task.id).unwrap().updated_at;
        assert!(after_cycle.unwrap() > created_stamp);
        assert_eq!(after_cycle, store.row(&task.id).await.unwrap().updated_at);

        handle.toggle_subtask(task.id.clone(), 0).await.unwrap();
        let changes = TaskChanges {
            title: Some("Write the spec".to_string()),
            ..TaskChanges::default()
        };
        handle.edit_task(task.id.clone(), changes).await.unwrap();
        let local = handle.snapshot().await.unwrap().get(&task.id).unwrap().clone();
        handle.reload().await.unwrap();
        let reloaded = handle.snapshot().await.unwrap().get(&task.id).unwrap().clone();
        assert_eq!(local, reloaded);
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_unknown_id_keeps_length(store: Arc<LocalStore>) {
        let (handle, task) = board_with_task(&store).await;
        assert!(!handle.delete_task(TaskId::from("missing")).await.unwrap());

        store.fail_next(StoreError::connection("offline")).await;
        assert!(handle.delete_task(TaskId::from("missing")).await.is_err());
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);

        assert!(handle.delete_task(task.id.clone()).await.unwrap());
        assert!(handle.snapshot().await.unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn create_keeps_task_when_reload_fails(store: Arc<LocalStore>) {
        let handle = BoardHandle::spawn(TaskGateway::new(store.clone()));
        store.fail_next_on(StoreOp::Select, StoreError::connection("offline")).await;
        let task = handle.create(draft("Write spec")).await.unwrap();
        let board = handle.snapshot().await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.tasks()[0].id, task.id);
    }
}
