// Definitions for secret service interactions

// DBus Names
pub const SS_DBUS_NAME: &str = "org.freedesktop.secrets";
pub const SS_DBUS_PATH: &str = "/org/freedesktop/secrets";
pub const DBUS_NAME: &str = "org.freedesktop.DBus";
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";

// Interfaces
pub const SS_SERVICE_IFACE: &str = "org.freedesktop.Secret.Service";
pub const SS_COLLECTION_IFACE: &str = "org.freedesktop.Secret.Collection";
pub const SS_ITEM_IFACE: &str = "org.freedesktop.Secret.Item";
pub const SS_PROMPT_IFACE: &str = "org.freedesktop.Secret.Prompt";
pub const SS_SESSION_IFACE: &str = "org.freedesktop.Secret.Session";
pub const DBUS_IFACE: &str = "org.freedesktop.DBus";
pub const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

// Item Properties
pub const SS_ITEM_LABEL: &str = "org.freedesktop.Secret.Item.Label";
pub const SS_ITEM_ATTRIBUTES: &str = "org.freedesktop.Secret.Item.Attributes";

// Collection properties
pub const SS_COLLECTION_LABEL: &str = "org.freedesktop.Secret.Collection.Label";

// Algorithm Names
pub const ALGORITHM_PLAIN: &str = "plain";
pub const ALGORITHM_DH: &str = "dh-ietf1024-sha256-aes128-cbc-pkcs7";

// Error names
pub const ERR_NO_SUCH_OBJECT: &str = "org.freedesktop.Secret.Error.NoSuchObject";
pub const ERR_IS_LOCKED: &str = "org.freedesktop.Secret.Error.IsLocked";
pub const ERR_NO_SESSION: &str = "org.freedesktop.Secret.Error.NoSession";
pub const ERR_NOT_SUPPORTED: &str = "org.freedesktop.DBus.Error.NotSupported";
pub const ERR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
pub const ERR_SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
pub const ERR_NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";

// Well-known aliases
pub const ALIAS_DEFAULT: &str = "default";
pub const ALIAS_SESSION: &str = "session";

// The "no object" path used for absent prompts and unset aliases
pub const NO_OBJECT: &str = "/";
