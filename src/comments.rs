use crate::model::Comment;

/// Comment list and draft for the video whose panel is open.
#[derive(Debug, Clone)]
pub struct CommentPanel {
    pub slide: usize,
    pub video_id: String,
    pub comments: Vec<Comment>,
    pub input: String,
    pub loading: bool,
    pub submitting: bool,
    pub(crate) request_id: u64,
}

impl CommentPanel {
    pub(crate) fn open(slide: usize, video_id: impl Into<String>, request_id: u64) -> Self {
        Self {
            slide,
            video_id: video_id.into(),
            comments: Vec::new(),
            input: String::new(),
            loading: true,
            submitting: false,
            request_id,
        }
    }

    pub(crate) fn loaded(&mut self, comments: Vec<Comment>) {
        self.comments = comments;
        self.loading = false;
    }

    pub(crate) fn load_failed(&mut self) {
        self.comments.clear();
        self.loading = false;
    }

    /// Empties the draft for submission, returning the text that was in it.
    pub(crate) fn take_input(&mut self) -> String {
        self.submitting = true;
        std::mem::take(&mut self.input)
    }

    pub(crate) fn posted(&mut self, comment: Comment) {
        self.submitting = false;
        self.comments.insert(0, comment);
    }

    pub(crate) fn post_failed(&mut self, draft: String) {
        self.submitting = false;
        if self.input.is_empty() {
            self.input = draft;
        } else {
            self.input = format!("{draft}{}", self.input);
        }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, text: &str) -> Comment {
        Comment {
            id: id.into(),
            text: text.into(),
            author: None,
            created_at: None,
        }
    }

    #[test]
    fn posted_comments_are_prepended() {
        let mut panel = CommentPanel::open(0, "v1", 1);
        panel.loaded(vec![comment("c1", "older")]);
        panel.input = "nice!".into();
        assert_eq!(panel.take_input(), "nice!");
        assert!(panel.input.is_empty());
        panel.posted(comment("c2", "nice!"));
        assert_eq!(panel.comments[0].id, "c2");
        assert_eq!(panel.len(), 2);
        assert!(!panel.submitting);
    }

    #[test]
    fn failed_post_restores_draft_ahead_of_new_typing() {
        let mut panel = CommentPanel::open(0, "v1", 1);
        panel.input = "nice!".into();
        let draft = panel.take_input();
        panel.input = " again".into();
        panel.post_failed(draft);
        assert_eq!(panel.input, "nice! again");
        assert!(panel.is_empty());
    }
}
