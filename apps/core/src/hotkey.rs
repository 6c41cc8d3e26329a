#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Enter,
    Escape,
    Char(char),
    Other(String),
}

impl Key {
    /// Accepts DOM-style key names (`ArrowUp`, `Escape`) and their short forms.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "arrowup" | "up" => Self::ArrowUp,
            "arrowdown" | "down" => Self::ArrowDown,
            "enter" | "return" => Self::Enter,
            "escape" | "esc" => Self::Escape,
            _ => {
                let mut chars = trimmed.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => Self::Other(trimmed.to_string()),
                }
            }
        }
    }

    /// Keys the open panel owns; they must not reach page handlers underneath.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Self::ArrowUp | Self::ArrowDown | Self::Enter | Self::Escape
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_ctrl(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        }
    }

    pub fn with_meta(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                meta: true,
                ..Modifiers::default()
            },
        }
    }

    /// Parses `Escape`, `Ctrl+K`, `Mod+K` style chords. `Mod` is reported as Ctrl.
    pub fn parse(input: &str) -> Result<Self, String> {
        let parts: Vec<&str> = input
            .split('+')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        let Some((key_raw, modifier_parts)) = parts.split_last() else {
            return Err("key is required".into());
        };

        let mut modifiers = Modifiers::default();
        for part in modifier_parts {
            match normalize_modifier(part)? {
                ModifierName::Ctrl | ModifierName::Mod => modifiers.ctrl = true,
                ModifierName::Meta => modifiers.meta = true,
                ModifierName::Alt => modifiers.alt = true,
                ModifierName::Shift => modifiers.shift = true,
            }
        }

        Ok(Self {
            key: Key::parse(key_raw),
            modifiers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModifierName {
    Ctrl,
    Meta,
    Mod,
    Alt,
    Shift,
}

fn normalize_modifier(input: &str) -> Result<ModifierName, String> {
    match input.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Ok(ModifierName::Ctrl),
        "cmd" | "command" | "meta" | "super" => Ok(ModifierName::Meta),
        "mod" => Ok(ModifierName::Mod),
        "alt" | "option" => Ok(ModifierName::Alt),
        "shift" => Ok(ModifierName::Shift),
        _ => Err(format!("unsupported modifier '{input}'")),
    }
}

/// Global chord that opens the panel, e.g. `Mod+K` (Ctrl on Linux/Windows, Cmd on macOS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub primary: PrimaryModifier,
    pub alt: bool,
    pub shift: bool,
    pub key: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryModifier {
    Ctrl,
    Meta,
    CtrlOrMeta,
    None,
}

impl Shortcut {
    pub fn matches(&self, input: &KeyInput) -> bool {
        let Key::Char(c) = input.key else {
            return false;
        };
        if !c.eq_ignore_ascii_case(&self.key) {
            return false;
        }

        let m = input.modifiers;
        let primary_ok = match self.primary {
            PrimaryModifier::Ctrl => m.ctrl,
            PrimaryModifier::Meta => m.meta,
            PrimaryModifier::CtrlOrMeta => m.ctrl || m.meta,
            PrimaryModifier::None => !m.ctrl && !m.meta,
        };
        primary_ok && m.alt == self.alt && m.shift == self.shift
    }
}

impl Default for Shortcut {
    fn default() -> Self {
        Self {
            primary: PrimaryModifier::CtrlOrMeta,
            alt: false,
            shift: false,
            key: 'k',
        }
    }
}

pub fn parse_shortcut(input: &str) -> Result<Shortcut, String> {
    let parts: Vec<&str> = input
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() < 2 {
        return Err("shortcut must include at least one modifier and one key".into());
    }

    let key_raw = parts[parts.len() - 1];
    let mut chars = key_raw.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
        _ => return Err(format!("shortcut key must be a single letter or digit, got '{key_raw}'")),
    };

    let mut shortcut = Shortcut {
        primary: PrimaryModifier::None,
        alt: false,
        shift: false,
        key,
    };
    for part in &parts[..parts.len() - 1] {
        match normalize_modifier(part)? {
            ModifierName::Ctrl => shortcut.primary = combine(shortcut.primary, PrimaryModifier::Ctrl),
            ModifierName::Meta => shortcut.primary = combine(shortcut.primary, PrimaryModifier::Meta),
            ModifierName::Mod => shortcut.primary = PrimaryModifier::CtrlOrMeta,
            ModifierName::Alt => shortcut.alt = true,
            ModifierName::Shift => shortcut.shift = true,
        }
    }

    if shortcut.primary == PrimaryModifier::None {
        return Err("shortcut must include Ctrl, Cmd or Mod".into());
    }

    Ok(shortcut)
}

fn combine(current: PrimaryModifier, next: PrimaryModifier) -> PrimaryModifier {
    match (current, next) {
        (PrimaryModifier::None, next) => next,
        (current, next) if current == next => current,
        _ => PrimaryModifier::CtrlOrMeta,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_shortcut, Key, KeyInput, PrimaryModifier};

    #[test]
    fn mod_shortcut_accepts_ctrl_and_cmd() {
        let shortcut = parse_shortcut("Mod+K").unwrap();
        assert_eq!(shortcut.primary, PrimaryModifier::CtrlOrMeta);
        assert!(shortcut.matches(&KeyInput::with_ctrl(Key::Char('k'))));
        assert!(shortcut.matches(&KeyInput::with_meta(Key::Char('K'))));
        assert!(!shortcut.matches(&KeyInput::plain(Key::Char('k'))));
    }

    #[test]
    fn ctrl_only_shortcut_ignores_cmd() {
        let shortcut = parse_shortcut("Ctrl+K").unwrap();
        assert!(!shortcut.matches(&KeyInput::with_meta(Key::Char('k'))));
    }

    #[test]
    fn rejects_shortcut_without_primary_modifier() {
        assert!(parse_shortcut("Shift+K").is_err());
        assert!(parse_shortcut("K").is_err());
        assert!(parse_shortcut("Ctrl+Space").is_err());
    }

    #[test]
    fn parses_key_chords() {
        let input = KeyInput::parse("Cmd+k").unwrap();
        assert!(input.modifiers.meta);
        assert_eq!(input.key, Key::Char('k'));
        assert_eq!(KeyInput::parse("Esc").unwrap().key, Key::Escape);
        assert_eq!(KeyInput::parse("Down").unwrap().key, Key::ArrowDown);
    }
}
