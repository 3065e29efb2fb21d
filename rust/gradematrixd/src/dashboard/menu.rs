use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    Accountant,
    Librarian,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "TEACHER" => Some(Self::Teacher),
            "ACCOUNTANT" => Some(Self::Accountant),
            "LIBRARIAN" => Some(Self::Librarian),
            _ => None,
        }
    }
}

/// Everything menu derivation may look at. Built per request by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuContext {
    #[serde(default)]
    pub roles: Vec<String>,
    pub tenant_id: i64,
    pub branch_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub key: &'static str,
    pub label: &'static str,
    pub path: String,
}

struct Entry {
    key: &'static str,
    label: &'static str,
    slug: &'static str,
    roles: &'static [Role],
}

use Role::{Accountant, Admin, Librarian, Teacher};

// Fixed display order.
const MENU: &[Entry] = &[
    Entry {
        key: "dashboard",
        label: "Dashboard",
        slug: "dashboard",
        roles: &[Admin, Teacher, Accountant, Librarian],
    },
    Entry {
        key: "attendance",
        label: "Attendance",
        slug: "attendance",
        roles: &[Admin, Teacher],
    },
    Entry {
        key: "timetable",
        label: "Timetable",
        slug: "timetable",
        roles: &[Admin, Teacher],
    },
    Entry {
        key: "assessments",
        label: "Assessments",
        slug: "assessments",
        roles: &[Admin, Teacher],
    },
    Entry {
        key: "fees",
        label: "Fees",
        slug: "fees",
        roles: &[Admin, Accountant],
    },
    Entry {
        key: "library",
        label: "Library",
        slug: "library",
        roles: &[Admin, Librarian],
    },
    Entry {
        key: "pos",
        label: "Point of Sale",
        slug: "pos",
        roles: &[Admin, Accountant, Librarian],
    },
    Entry {
        key: "settings",
        label: "Settings",
        slug: "settings",
        roles: &[Admin],
    },
];

/// Union of the menus of every recognised role in `ctx`.
pub fn derive_menu(ctx: &MenuContext) -> Vec<MenuItem> {
    let roles: Vec<Role> = ctx.roles.iter().filter_map(|r| Role::parse(r)).collect();
    MENU.iter()
        .filter(|e| e.roles.iter().any(|r| roles.contains(r)))
        .map(|e| MenuItem {
            key: e.key,
            label: e.label,
            path: format!("/t/{}/b/{}/{}", ctx.tenant_id, ctx.branch_id, e.slug),
        })
        .collect()
}
