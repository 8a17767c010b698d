// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Small,
    Medium,
    Large,
}

impl Case {
    fn sections(self) -> usize {
        match self {
            Self::Small => 4,
            Self::Medium => 40,
            Self::Large => 400,
        }
    }
}

/// A landing page with `sections` service blocks, each holding a title, a description, an image
/// and a short review list.
pub fn landing_page(case: Case) -> String {
    let mut out = String::from(
        r#"<header class="hero"><h1 class="hero-title">Bakery on the corner</h1><p class="hero-subtitle">Bread, cakes and coffee since 1987.</p></header>"#,
    );
    for index in 0..case.sections() {
        let _ = write!(
            out,
            concat!(
                r#"<section class="service">"#,
                r#"<h2 class="section-title">Service {index}</h2>"#,
                r#"<div class="service-description">Hand-made every morning, batch {index}.</div>"#,
                r#"<img src="/img/service-{index}.jpg" alt="Service {index}"/>"#,
                r#"<ul><li>Fresh</li><li>Local <a href="/about">flour</a></li></ul>"#,
                r#"<blockquote class="review-text">Best in town, visit {index}.</blockquote>"#,
                r#"</section>"#,
            ),
            index = index
        );
    }
    out.push_str(r#"<footer><span>Open daily</span><script>window.track = 1;</script></footer>"#);
    out
}
