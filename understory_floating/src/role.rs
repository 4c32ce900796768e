// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Role: ARIA attributes linking the reference, floating element and items.

use alloc::format;
use alloc::string::String;

use crate::context::{FloatingContext, unique_id};
use crate::interactions::{ElementProps, Interaction, ItemState, Slot};

/// Role of the floating element.
///
/// The last three are component roles that map onto an ARIA role.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Role {
    /// `tooltip`
    Tooltip,
    /// `dialog`
    #[default]
    Dialog,
    /// `alertdialog`
    AlertDialog,
    /// `menu`
    Menu,
    /// `listbox`
    Listbox,
    /// `grid`
    Grid,
    /// `tree`
    Tree,
    /// Select-only combobox; floating role `listbox`.
    Select,
    /// Label-like tooltip linked with `aria-labelledby`; no floating role.
    Label,
    /// Editable combobox; floating role `listbox`.
    Combobox,
}

impl Role {
    /// Role name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tooltip => "tooltip",
            Self::Dialog => "dialog",
            Self::AlertDialog => "alertdialog",
            Self::Menu => "menu",
            Self::Listbox => "listbox",
            Self::Grid => "grid",
            Self::Tree => "tree",
            Self::Select => "select",
            Self::Label => "label",
            Self::Combobox => "combobox",
        }
    }

    /// ARIA role of the floating element, `None` for [`Role::Label`].
    pub const fn aria_role(self) -> Option<&'static str> {
        match self {
            Self::Select | Self::Combobox => Some("listbox"),
            Self::Label => None,
            other => Some(other.as_str()),
        }
    }
}

/// Options for [`RoleProps`]. The default is an enabled dialog.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RoleOptions {
    /// Master switch; disabled contributes nothing.
    pub enabled: bool,
    /// Role of the floating element.
    pub role: Role,
}

impl RoleOptions {
    /// Enabled with `role`.
    pub fn new(role: Role) -> Self {
        Self {
            enabled: true,
            role,
        }
    }
}

impl Default for RoleOptions {
    fn default() -> Self {
        Self::new(Role::default())
    }
}

/// Role controller. Attribute-only; it handles no events.
#[derive(Clone, Debug)]
pub struct RoleProps {
    options: RoleOptions,
    reference_id: String,
}

impl RoleProps {
    /// A controller with the given options.
    pub fn new(options: RoleOptions) -> Self {
        Self {
            options,
            reference_id: unique_id(),
        }
    }

    /// Id given to a menu's reference.
    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    fn reference<K: Copy>(&self, ctx: &FloatingContext<K>) -> ElementProps {
        let role = self.options.role;
        let aria = role.aria_role();
        let open = ctx.open();
        let floating_id = open.then(|| ctx.floating_id());

        if aria == Some("tooltip") || role == Role::Label {
            let name = if role == Role::Label {
                "aria-labelledby"
            } else {
                "aria-describedby"
            };
            return ElementProps::new().with_opt_attr(name, floating_id);
        }

        let mut props = ElementProps::new()
            .with_attr("aria-expanded", if open { "true" } else { "false" })
            .with_opt_attr(
                "aria-haspopup",
                if aria == Some("alertdialog") {
                    Some("dialog")
                } else {
                    aria
                },
            )
            .with_opt_attr("aria-controls", floating_id);
        if aria == Some("listbox") {
            props = props.with_attr("role", "combobox");
        }
        if aria == Some("menu") {
            props = props.with_attr("id", self.reference_id.as_str());
        }
        match role {
            Role::Select => props.with_attr("aria-autocomplete", "none"),
            Role::Combobox => props.with_attr("aria-autocomplete", "list"),
            _ => props,
        }
    }

    fn floating<K: Copy>(&self, ctx: &FloatingContext<K>) -> ElementProps {
        let aria = self.options.role.aria_role();
        let props = ElementProps::new()
            .with_attr("id", ctx.floating_id())
            .with_opt_attr("role", aria);
        if aria == Some("menu") {
            props.with_attr("aria-labelledby", self.reference_id.as_str())
        } else {
            props
        }
    }

    fn item<K: Copy>(&self, ctx: &FloatingContext<K>, item: ItemState) -> ElementProps {
        let common = || {
            ElementProps::new().with_attr("role", "option").with_opt_attr(
                "id",
                item.active.then(|| format!("{}-option", ctx.floating_id())),
            )
        };
        match self.options.role {
            Role::Select => common().with_attr("aria-selected", item.active && item.selected),
            Role::Combobox => common().with_opt_attr("aria-selected", item.active.then_some(true)),
            _ => ElementProps::new(),
        }
    }
}

impl<K: Copy, H> Interaction<K, H> for RoleProps {
    fn props(&self, ctx: &FloatingContext<K>, slot: Slot, item: ItemState) -> ElementProps {
        if !self.options.enabled {
            return ElementProps::new();
        }
        match slot {
            Slot::Reference => self.reference(ctx),
            Slot::Floating => self.floating(ctx),
            Slot::Item => self.item(ctx, item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::interactions::{AttrValue, Interactions, MergedProps, UserProps};

    fn props(role: Role, open: bool, slot: Slot) -> (MergedProps, String) {
        let ctx: FloatingContext<NodeId> = FloatingContext::new().with_open(open);
        let interactions: Interactions<NodeId, MemoryDom> =
            Interactions::new().with(RoleProps::new(RoleOptions::new(role)));
        let user = UserProps::new();
        let user = (slot == Slot::Item).then_some(&user);
        (
            interactions.props(&ctx, slot, user),
            String::from(ctx.floating_id()),
        )
    }

    fn attr<'a>(props: &'a MergedProps, name: &str) -> Option<&'a AttrValue> {
        props.attributes.get(name)
    }

    fn s(v: &str) -> AttrValue {
        AttrValue::from(v)
    }

    #[test]
    fn tooltip_describes_only_while_open() {
        let (p, id) = props(Role::Tooltip, true, Slot::Reference);
        assert_eq!(attr(&p, "aria-describedby"), Some(&AttrValue::Str(id)));
        assert_eq!(attr(&p, "aria-expanded"), None);

        let (p, _) = props(Role::Tooltip, false, Slot::Reference);
        assert!(p.attributes.is_empty());

        let (p, id) = props(Role::Tooltip, true, Slot::Floating);
        assert_eq!(attr(&p, "id"), Some(&AttrValue::Str(id)));
        assert_eq!(attr(&p, "role"), Some(&s("tooltip")));
    }

    #[test]
    fn label_links_with_labelledby_and_has_no_role() {
        let (p, id) = props(Role::Label, true, Slot::Reference);
        assert_eq!(attr(&p, "aria-labelledby"), Some(&AttrValue::Str(id)));
        let (p, _) = props(Role::Label, true, Slot::Floating);
        assert_eq!(attr(&p, "role"), None);
    }

    #[test]
    fn dialog_reference_attributes() {
        let (p, id) = props(Role::Dialog, true, Slot::Reference);
        assert_eq!(attr(&p, "aria-expanded"), Some(&s("true")));
        assert_eq!(attr(&p, "aria-haspopup"), Some(&s("dialog")));
        assert_eq!(attr(&p, "aria-controls"), Some(&AttrValue::Str(id)));

        let (p, _) = props(Role::Dialog, false, Slot::Reference);
        assert_eq!(attr(&p, "aria-expanded"), Some(&s("false")));
        assert_eq!(attr(&p, "aria-controls"), None);
    }

    #[test]
    fn alertdialog_pops_up_a_dialog() {
        let (p, _) = props(Role::AlertDialog, false, Slot::Reference);
        assert_eq!(attr(&p, "aria-haspopup"), Some(&s("dialog")));
        let (p, _) = props(Role::AlertDialog, false, Slot::Floating);
        assert_eq!(attr(&p, "role"), Some(&s("alertdialog")));
    }

    #[test]
    fn menu_links_both_ways() {
        let role = RoleProps::new(RoleOptions::new(Role::Menu));
        let ctx: FloatingContext<NodeId> = FloatingContext::new();
        let reference =
            Interaction::<NodeId, MemoryDom>::props(&role, &ctx, Slot::Reference, ItemState::default());
        let floating =
            Interaction::<NodeId, MemoryDom>::props(&role, &ctx, Slot::Floating, ItemState::default());
        let id = s(role.reference_id());
        assert_eq!(reference.attributes.get("id"), Some(&id));
        assert_eq!(floating.attributes.get("aria-labelledby"), Some(&id));
        assert_ne!(role.reference_id(), ctx.floating_id());
    }

    #[test]
    fn select_and_combobox_are_listboxes() {
        let (p, _) = props(Role::Select, false, Slot::Reference);
        assert_eq!(attr(&p, "role"), Some(&s("combobox")));
        assert_eq!(attr(&p, "aria-haspopup"), Some(&s("listbox")));
        assert_eq!(attr(&p, "aria-autocomplete"), Some(&s("none")));

        let (p, _) = props(Role::Combobox, false, Slot::Reference);
        assert_eq!(attr(&p, "aria-autocomplete"), Some(&s("list")));
        let (p, _) = props(Role::Combobox, false, Slot::Floating);
        assert_eq!(attr(&p, "role"), Some(&s("listbox")));
    }

    #[test]
    fn item_props_depend_on_state() {
        let ctx: FloatingContext<NodeId> = FloatingContext::new();
        let interactions: Interactions<NodeId, MemoryDom> =
            Interactions::new().with(RoleProps::new(RoleOptions::new(Role::Select)));
        let active = UserProps::new().with_attr("active", true).with_attr("selected", true);
        let p = interactions.props(&ctx, Slot::Item, Some(&active));
        assert_eq!(attr(&p, "role"), Some(&s("option")));
        assert_eq!(
            attr(&p, "id"),
            Some(&AttrValue::Str(format!("{}-option", ctx.floating_id())))
        );
        assert_eq!(attr(&p, "aria-selected"), Some(&AttrValue::Bool(true)));
        assert_eq!(attr(&p, "active"), None);

        let idle = UserProps::new().with_attr("selected", true);
        let p = interactions.props(&ctx, Slot::Item, Some(&idle));
        assert_eq!(attr(&p, "id"), None);
        assert_eq!(attr(&p, "aria-selected"), Some(&AttrValue::Bool(false)));
    }

    #[test]
    fn select_item_props_without_user_props() {
        let ctx: FloatingContext<NodeId> = FloatingContext::new();
        let interactions: Interactions<NodeId, MemoryDom> =
            Interactions::new().with(RoleProps::new(RoleOptions::new(Role::Select)));
        let p = interactions.props(&ctx, Slot::Item, None);
        assert_eq!(attr(&p, "role"), Some(&s("option")));
        assert_eq!(attr(&p, "id"), None);
        assert_eq!(attr(&p, "aria-selected"), Some(&AttrValue::Bool(false)));
    }

    #[test]
    fn combobox_item_marks_only_active() {
        let (p, _) = props(Role::Combobox, false, Slot::Item);
        assert_eq!(attr(&p, "role"), Some(&s("option")));
        assert_eq!(attr(&p, "aria-selected"), None);
    }

    #[test]
    fn other_roles_have_no_item_props() {
        let (p, _) = props(Role::Menu, false, Slot::Item);
        assert!(p.attributes.is_empty());
    }

    #[test]
    fn default_options_describe_a_dialog() {
        let options = RoleOptions::default();
        assert!(options.enabled);
        assert_eq!(options.role, Role::Dialog);

        let role = RoleProps::new(options);
        let ctx: FloatingContext<NodeId> = FloatingContext::new();
        let floating =
            Interaction::<NodeId, MemoryDom>::props(&role, &ctx, Slot::Floating, ItemState::default());
        assert_eq!(floating.attributes.get("role"), Some(&s("dialog")));
        let reference =
            Interaction::<NodeId, MemoryDom>::props(&role, &ctx, Slot::Reference, ItemState::default());
        assert_eq!(reference.attributes.get("aria-haspopup"), Some(&s("dialog")));
    }

    #[test]
    fn disabled_contributes_nothing() {
        let role = RoleProps::new(RoleOptions {
            enabled: false,
            role: Role::Dialog,
        });
        let ctx: FloatingContext<NodeId> = FloatingContext::new();
        for slot in [Slot::Reference, Slot::Floating, Slot::Item] {
            assert!(
                Interaction::<NodeId, MemoryDom>::props(&role, &ctx, slot, ItemState::default())
                    .is_empty()
            );
        }
    }
}
