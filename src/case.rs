//! Name folding for the controller/action naming convention.
//! Route values are kebab-case (`blog-post`, `not-found`); controller keys are PascalCase
//! (`Blog/BlogPostController`), action names camelCase (`notFound`), templates kebab-case.

/// Convert a kebab-, snake- or camelCase identifier to PascalCase.
/// e.g. "blog-post" -> "BlogPost", "admin_dashboard" -> "AdminDashboard", "notFound" -> "NotFound"
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '-' || c == '_' || c == '.' || c == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a kebab- or snake_case identifier to camelCase.
/// e.g. "not-found" -> "notFound", "view_post" -> "viewPost", "index" -> "index"
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a camelCase or PascalCase identifier to kebab-case.
/// e.g. "BlogPost" -> "blog-post", "notFound" -> "not-found"
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

/// Controller key for a module/controller pair: `Admin/DashboardController` with delimiter `/`.
pub fn controller_key(module: &str, controller: &str, delimiter: &str) -> String {
    let controller = to_pascal_case(controller);
    let controller = controller.strip_suffix("Controller").unwrap_or(&controller);
    format!("{}{}{}Controller", to_pascal_case(module), delimiter, controller)
}

/// Action method name for a route action: "view-post" -> "viewPost".
pub fn action_name(action: &str) -> String {
    to_camel_case(action)
}

/// Conventional template name: `module/controller/action` in kebab-case.
pub fn template_name(module: &str, controller: &str, action: &str) -> String {
    format!(
        "{}/{}/{}",
        to_kebab_case(&to_pascal_case(module)),
        to_kebab_case(&to_pascal_case(controller)),
        to_kebab_case(&to_camel_case(action))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_kebab_to_pascal_and_camel() {
        assert_eq!(to_pascal_case("blog-post"), "BlogPost");
        assert_eq!(to_pascal_case("admin_dashboard"), "AdminDashboard");
        assert_eq!(to_camel_case("not-found"), "notFound");
        assert_eq!(to_camel_case("notFound"), "notFound");
        assert_eq!(to_kebab_case("BlogPost"), "blog-post");
    }

    #[test]
    fn controller_key_joins_with_delimiter() {
        assert_eq!(controller_key("admin", "dashboard", "/"), "Admin/DashboardController");
        assert_eq!(controller_key("blog", "blog-post", "\\"), "Blog\\BlogPostController");
        assert_eq!(controller_key("blog", "IndexController", "/"), "Blog/IndexController");
    }

    #[test]
    fn template_name_is_kebab() {
        assert_eq!(template_name("Admin", "blog-post", "editDraft"), "admin/blog-post/edit-draft");
    }
}
