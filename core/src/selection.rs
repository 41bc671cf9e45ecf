/// Tabs of the analysis panel shown next to an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTab {
    Citation,
    Thought,
    SupportingContent,
}

/// Which turn's analysis panel is open, and on which tab.
///
/// Clicking the open tab of the selected turn again closes the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_turn: usize,
    pub active_tab: Option<AnalysisTab>,
    pub active_citation: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_tab(&mut self, tab: AnalysisTab, index: usize) {
        if self.active_tab == Some(tab) && self.selected_turn == index {
            self.active_tab = None;
        } else {
            self.active_tab = Some(tab);
        }
        self.selected_turn = index;
    }

    pub fn show_citation(&mut self, citation: &str, index: usize) {
        if self.active_citation.as_deref() == Some(citation)
            && self.active_tab == Some(AnalysisTab::Citation)
            && self.selected_turn == index
        {
            self.active_tab = None;
        } else {
            self.active_citation = Some(citation.to_string());
            self.active_tab = Some(AnalysisTab::Citation);
        }
        self.selected_turn = index;
    }

    /// Close the panel and forget the citation; the selected turn is kept
    pub fn reset_panel(&mut self) {
        self.active_tab = None;
        self.active_citation = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_open(&self) -> bool {
        self.active_tab.is_some()
    }
}
