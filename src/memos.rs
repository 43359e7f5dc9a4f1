use crate::models::Memo;
use crate::tags::has_all_tags;

/// Renumber `order` to match list position (0..n-1).
///
/// Every structural change to a memo list goes through here.
pub fn reindex(memos: &mut [Memo]) {
    for (index, memo) in memos.iter_mut().enumerate() {
        memo.order = index as i64;
    }
}

/// Append an empty memo and return its id
pub fn add_memo(memos: &mut Vec<Memo>, id: i64) -> i64 {
    memos.push(Memo::new(id, "", memos.len() as i64));
    reindex(memos);
    id
}

/// Replace a memo's content; tags follow the content
pub fn update_memo(memos: &mut [Memo], id: i64, content: &str) -> bool {
    match memos.iter_mut().find(|m| m.id == id) {
        Some(memo) => {
            memo.set_content(content);
            true
        }
        None => false,
    }
}

pub fn delete_memo(memos: &mut Vec<Memo>, id: i64) -> bool {
    let before = memos.len();
    memos.retain(|m| m.id != id);
    reindex(memos);
    memos.len() != before
}

pub fn move_to_top(memos: &mut Vec<Memo>, id: i64) -> bool {
    match memos.iter().position(|m| m.id == id) {
        Some(index) if index > 0 => {
            let memo = memos.remove(index);
            memos.insert(0, memo);
            reindex(memos);
            true
        }
        _ => false,
    }
}

pub fn move_to_bottom(memos: &mut Vec<Memo>, id: i64) -> bool {
    match memos.iter().position(|m| m.id == id) {
        Some(index) if index + 1 < memos.len() => {
            let memo = memos.remove(index);
            memos.push(memo);
            reindex(memos);
            true
        }
        _ => false,
    }
}

/// Move `dragged` into the slot currently held by `target`
pub fn move_memo(memos: &mut Vec<Memo>, dragged: i64, target: i64) -> bool {
    if dragged == target {
        return false;
    }
    let from = memos.iter().position(|m| m.id == dragged);
    let to = memos.iter().position(|m| m.id == target);
    match (from, to) {
        (Some(from), Some(to)) => {
            let memo = memos.remove(from);
            memos.insert(to, memo);
            reindex(memos);
            true
        }
        _ => false,
    }
}

/// Memos carrying every selected tag
pub fn filter_by_tags<'a>(memos: &'a [Memo], selected: &[String]) -> Vec<&'a Memo> {
    memos
        .iter()
        .filter(|memo| has_all_tags(&memo.content, selected))
        .collect()
}

/// Distinct tags across all memos, in first-seen order
pub fn memo_tags(memos: &[Memo]) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in memos.iter().flat_map(|m| m.tags.iter()) {
        if !seen.contains(tag) {
            seen.push(tag.clone());
        }
    }
    seen
}
