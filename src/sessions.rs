use crate::models::Session;

/// Newest sessions live at the front
pub fn add_session(sessions: &mut Vec<Session>, session: Session) {
    sessions.insert(0, session);
}

pub fn delete_session(sessions: &mut Vec<Session>, id: i64) -> bool {
    let before = sessions.len();
    sessions.retain(|s| s.id != id);
    sessions.len() != before
}

/// Apply `edit` to the session with `id`; returns false when there is none
pub fn update_session<F>(sessions: &mut [Session], id: i64, edit: F) -> bool
where
    F: FnOnce(&mut Session),
{
    match sessions.iter_mut().find(|s| s.id == id) {
        Some(session) => {
            edit(session);
            true
        }
        None => false,
    }
}
