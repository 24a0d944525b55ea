use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::broadcast::{Subscription, TocBroadcaster};
use crate::formats::{TocNode, TocTree};

/// Route segments identifying what the reader currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuRoute {
    pub collection_id: String,
    pub publication_id: Option<String>,
    pub chapter_id: Option<String>,
    pub position_id: Option<String>,
}

impl MenuRoute {
    /// Candidate item ids, most specific first:
    /// `{c}_{p}_{ch};{pos}`, `{c}_{p}_{ch}`, `{c}_{p}`.
    pub fn candidate_ids(&self) -> Vec<String> {
        let Some(publication_id) = self.publication_id.as_deref().filter(|p| !p.is_empty()) else {
            return Vec::new();
        };
        let mut base = format!("{}_{publication_id}", self.collection_id);
        let mut ancestors = vec![base.clone()];
        if let Some(chapter_id) = self.chapter_id.as_deref().filter(|c| !c.is_empty()) {
            base = format!("{base}_{chapter_id}");
            ancestors.push(base.clone());
        }

        let mut ids = Vec::new();
        if let Some(position_id) = self.position_id.as_deref().filter(|p| !p.is_empty()) {
            ids.push(format!("{base};{position_id}"));
        }
        ids.extend(ancestors.into_iter().rev());
        ids
    }

    pub fn item_id(&self) -> Option<String> {
        self.candidate_ids().into_iter().next()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSelection {
    pub item_id: String,
    pub node_id: Option<String>,
    pub exact: bool,
    /// Node ids of every node enclosing the selection, outermost first.
    pub expanded: Vec<String>,
}

/// Finds the node matching `route`: an exact item id match wherever it sits
/// in the tree, else the closest ancestor id the route implies.
pub fn select(tree: &TocTree, route: &MenuRoute) -> Option<MenuSelection> {
    let candidates = route.candidate_ids();
    candidates.iter().enumerate().find_map(|(rank, item_id)| {
        let mut path = Vec::new();
        find_path(&tree.children, item_id, &mut path).map(|node| MenuSelection {
            item_id: item_id.clone(),
            node_id: node.entry.node_id.clone(),
            exact: rank == 0,
            expanded: path,
        })
    })
}

fn find_path<'a>(nodes: &'a [TocNode], item_id: &str, path: &mut Vec<String>) -> Option<&'a TocNode> {
    for node in nodes {
        if node.entry.item_id() == Some(item_id) {
            return Some(node);
        }
        if node.children().is_empty() {
            continue;
        }
        if let Some(node_id) = &node.entry.node_id {
            path.push(node_id.clone());
        }
        if let Some(found) = find_path(node.children(), item_id, path) {
            return Some(found);
        }
        if node.entry.node_id.is_some() {
            path.pop();
        }
    }
    None
}

#[derive(Debug, Clone, Default)]
pub struct SideMenuView {
    pub tree: Option<Arc<TocTree>>,
    pub selection: Option<MenuSelection>,
    pub expanded: HashSet<String>,
}

/// Hierarchical menu state, recomputed on every TOC emission.
pub struct SideMenu {
    state: Arc<Mutex<(MenuRoute, SideMenuView)>>,
    _tree: Subscription,
    _flattened: Subscription,
}

impl SideMenu {
    pub fn attach(broadcaster: &TocBroadcaster, route: MenuRoute) -> Self {
        let state = Arc::new(Mutex::new((route, SideMenuView::default())));

        let tree = broadcaster.tree.subscribe({
            let state = Arc::clone(&state);
            move |tree: &Arc<TocTree>| {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                let (route, view) = &mut *guard;
                view.tree = Some(Arc::clone(tree));
                recompute(route, view);
            }
        });
        // The flattened channel carries nothing the menu renders, but it
        // marks a finished transition the same way.
        let flattened = broadcaster.flattened.subscribe({
            let state = Arc::clone(&state);
            move |_| {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                let (route, view) = &mut *guard;
                recompute(route, view);
            }
        });

        Self {
            state,
            _tree: tree,
            _flattened: flattened,
        }
    }

    pub fn navigate(&self, route: MenuRoute) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (current, view) = &mut *guard;
        *current = route;
        recompute(current, view);
    }

    pub fn view(&self) -> SideMenuView {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
    }
}

fn recompute(route: &MenuRoute, view: &mut SideMenuView) {
    let selection = view.tree.as_deref().and_then(|tree| select(tree, route));
    view.expanded = view
        .tree
        .as_deref()
        .map(|tree| initially_expanded(&tree.children))
        .unwrap_or_default();
    if let Some(selection) = &selection {
        view.expanded.extend(selection.expanded.iter().cloned());
    }
    view.selection = selection;
}

fn initially_expanded(nodes: &[TocNode]) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut stack = nodes.iter().collect::<Vec<_>>();
    while let Some(node) = stack.pop() {
        if node.children().is_empty() {
            continue;
        }
        if node.entry.collapsed == Some(false)
            && let Some(node_id) = &node.entry.node_id
        {
            out.insert(node_id.clone());
        }
        stack.extend(node.children());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CollectionTocState;
    use crate::formats::TocEntry;

    fn route(publication: &str, chapter: Option<&str>, position: Option<&str>) -> MenuRoute {
        MenuRoute {
            collection_id: "1".to_owned(),
            publication_id: Some(publication.to_owned()),
            chapter_id: chapter.map(str::to_owned),
            position_id: position.map(str::to_owned),
        }
    }

    fn state() -> CollectionTocState {
        let root = TocNode::section(
            "Coll",
            vec![
                TocNode::section(
                    "Letters",
                    vec![
                        TocNode::leaf("1_2", "Letter"),
                        TocNode::leaf("1_2;p5", "Letter, paragraph 5"),
                    ],
                ),
                TocNode {
                    entry: TocEntry {
                        text: "Open".to_owned(),
                        collapsed: Some(false),
                        ..TocEntry::default()
                    },
                    children: Some(vec![TocNode::leaf("1_3", "Three")]),
                },
            ],
        );
        CollectionTocState::from_tree("1", Some(&root))
    }

    #[test]
    fn composes_candidate_ids_most_specific_first() {
        assert_eq!(
            route("2", Some("ch1"), Some("p5")).candidate_ids(),
            vec!["1_2_ch1;p5", "1_2_ch1", "1_2"]
        );
        assert_eq!(route("2", None, None).candidate_ids(), vec!["1_2"]);
        assert!(MenuRoute::default().candidate_ids().is_empty());
    }

    #[test]
    fn item_id_is_the_most_specific_candidate() {
        assert_eq!(
            route("2", Some("ch1"), Some("p5")).item_id().as_deref(),
            Some("1_2_ch1;p5")
        );
        assert_eq!(route("2", None, None).item_id().as_deref(), Some("1_2"));
        assert!(MenuRoute::default().item_id().is_none());
    }

    #[test]
    fn prefers_exact_match() {
        let state = state();
        let selection = select(&state.tree, &route("2", None, Some("p5"))).expect("selected");
        assert!(selection.exact);
        assert_eq!(selection.item_id, "1_2;p5");
        assert_eq!(selection.node_id.as_deref(), Some("n1-2"));
        assert_eq!(selection.expanded, vec!["n1"]);
    }

    #[test]
    fn falls_back_to_nearest_ancestor() {
        let state = state();
        let selection =
            select(&state.tree, &route("2", Some("ch9"), Some("p1"))).expect("selected");
        assert!(!selection.exact);
        assert_eq!(selection.item_id, "1_2");
        assert_eq!(selection.node_id.as_deref(), Some("n1-1"));
    }

    #[test]
    fn unknown_route_selects_nothing() {
        let state = state();
        assert!(select(&state.tree, &route("77", None, None)).is_none());
    }

    #[test]
    fn menu_follows_broadcasts() {
        let broadcaster = TocBroadcaster::new();
        let menu = SideMenu::attach(&broadcaster, route("2", None, None));
        assert!(menu.view().selection.is_none());

        let state = state();
        broadcaster.emit(Arc::clone(&state.tree), Arc::clone(&state.flattened));
        let view = menu.view();
        assert_eq!(
            view.selection.as_ref().and_then(|s| s.node_id.as_deref()),
            Some("n1-1")
        );
        assert!(view.expanded.contains("n1"));
        assert!(view.expanded.contains("n2"));

        menu.navigate(route("3", None, None));
        let view = menu.view();
        assert_eq!(
            view.selection.as_ref().map(|s| s.item_id.as_str()),
            Some("1_3")
        );
    }
}
