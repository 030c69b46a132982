use serde::{Deserialize, Serialize};

/// Classes marking a traffic-light indicator subtree.
pub const TRAFFIC_LIGHT_CLASSES: [&str; 3] = ["traffic-light", "traffic-light-card", "traffic-light-large"];

const NAV_ITEM_CLASS: &str = "nav-item";

/// Snapshot of the DOM element a pointer signal targeted.
///
/// `classes` are the element's own classes; `ancestor_classes` are those of
/// its ancestors up to (and including) the nearest article container, which
/// is enough to answer `closest(".x")` queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementRef {
    /// `data-article-id` of the nearest article container, if any.
    pub article_id: Option<String>,
    /// Upper-case tag name as reported by the DOM (`A`, `BUTTON`, `DIV`).
    pub tag: String,
    pub classes: Vec<String>,
    pub ancestor_classes: Vec<String>,
    /// True when this element *is* the article container.
    pub is_article_root: bool,
}

impl ElementRef {
    /// Element or any ancestor carries `class`.
    pub fn within(&self, class: &str) -> bool {
        self.classes.iter().chain(self.ancestor_classes.iter()).any(|c| c == class)
    }

    pub fn within_traffic_light(&self) -> bool {
        TRAFFIC_LIGHT_CLASSES.iter().any(|class| self.within(class))
    }

    pub fn classify(&self) -> ElementType {
        if self.within("traffic-light") {
            ElementType::TrafficLight
        } else if self.within(NAV_ITEM_CLASS) {
            ElementType::NavItem
        } else if self.tag.eq_ignore_ascii_case("a") {
            ElementType::Link
        } else if self.tag.eq_ignore_ascii_case("button") {
            ElementType::Button
        } else if self.article_id.is_some() {
            ElementType::ArticleCard
        } else {
            ElementType::Other
        }
    }
}

/// What kind of element a click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    TrafficLight,
    NavItem,
    Link,
    Button,
    ArticleCard,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVisibility {
    Visible,
    Hidden,
}

/// External signals from the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Signal {
    /// Viewport intersection change for an article container.
    Intersection {
        article_id: String,
        ratio: f64,
        is_intersecting: bool,
    },
    PointerEnter {
        target: ElementRef,
    },
    PointerLeave {
        target: ElementRef,
    },
    Click {
        target: ElementRef,
        /// Modal container currently carries its `active` class.
        #[serde(default)]
        modal_active: bool,
    },
    VisibilityState {
        state: PageVisibility,
    },
    /// View glue opened the reading modal for an article.
    ModalOpened {
        article_id: String,
    },
    ModalClosed,
    Unload,
}
