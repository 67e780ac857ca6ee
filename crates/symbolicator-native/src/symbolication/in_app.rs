//! Classification of images and frames into application and system code.

use std::sync::LazyLock;

use regex::Regex;

use crate::interface::RawObjectInfo;

/// Locations of installed app bundles on iOS devices.
const APP_BUNDLE_PATHS: &[&str] = &[
    "/var/containers/Bundle/Application/",
    "/private/var/containers/Bundle/Application/",
];
const SIM_PATH: &str = "/Developer/CoreSimulator/Devices/";
const SIM_APP_PATH: &str = "/Containers/Bundle/Application/";
const MAC_OS_PATH: &str = ".app/Contents/";

const SYSTEM_PREFIXES: &[&str] = &[
    "/usr/lib/",
    "/usr/lib64/",
    "/usr/libexec/",
    "/lib/",
    "/lib64/",
    "/System/",
    "/Library/Apple/",
    "/system/",
    "/apex/",
    "/vendor/lib",
];

/// Crash reporters and language runtimes that are shipped within app bundles.
static SUPPORT_FRAMEWORK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        /Frameworks/(
            libswift[a-zA-Z0-9]+\.dylib$ |
            (KSCrash|SentrySwift|Sentry|CrashReporter|Bugsnag|FirebaseCrashlytics)\.framework/
        )",
    )
    .unwrap()
});

fn is_windows_system_path(path: &str) -> bool {
    let lower = path.replace('/', "\\").to_ascii_lowercase();
    lower.starts_with("c:\\windows\\")
}

/// Whether the path lies inside an iOS, simulator or macOS application bundle.
pub fn is_app_bundle_path(path: &str) -> bool {
    APP_BUNDLE_PATHS.iter().any(|prefix| path.starts_with(prefix))
        || (path.contains(SIM_PATH) && path.contains(SIM_APP_PATH))
        || path.contains(MAC_OS_PATH)
}

/// Whether the path belongs to a crash reporter or runtime shipped inside an app bundle.
pub fn is_support_framework(path: &str) -> bool {
    SUPPORT_FRAMEWORK_RE.is_match(path)
}

/// Whether the path belongs to a library of the operating system.
pub fn is_system_path(path: &str) -> bool {
    SYSTEM_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) || is_windows_system_path(path)
}

/// Whether an image contains code of the application itself.
///
/// Apple images must live inside the app bundle. Other images count as application code unless
/// they are a known system library. Images without a path are never application code.
pub fn is_app_image(image: &RawObjectInfo) -> bool {
    let Some(path) = image.name.as_deref() else {
        return false;
    };

    if is_support_framework(path) {
        return false;
    }

    if image.ty.is_apple() {
        is_app_bundle_path(path)
    } else {
        !is_system_path(path)
    }
}

/// The default `in_app` of a frame that does not belong to any image.
pub fn unmatched_frame_in_app(package: Option<&str>) -> bool {
    !package.is_some_and(is_system_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ObjectType;

    fn image(ty: ObjectType, name: &str) -> RawObjectInfo {
        RawObjectInfo {
            ty,
            name: Some(name.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ios_app_image() {
        let app = image(
            ObjectType::Apple,
            "/var/containers/Bundle/Application/B33C37A8-F933-4B6B-9FFA-152282BFDF13/SentryTest.app/SentryTest",
        );
        assert!(is_app_image(&app));

        let private = image(
            ObjectType::Macho,
            "/private/var/containers/Bundle/Application/B33C37A8/SentryTest.app/Frameworks/Foo.framework/Foo",
        );
        assert!(is_app_image(&private));

        let system = image(ObjectType::Apple, "/usr/lib/system/libdyld.dylib");
        assert!(!is_app_image(&system));
    }

    #[test]
    fn test_simulator_and_macos_images() {
        let sim = image(
            ObjectType::Apple,
            "/Users/foo/Library/Developer/CoreSimulator/Devices/A8F1/data/Containers/Bundle/Application/E3C1/Test.app/Test",
        );
        assert!(is_app_image(&sim));

        let mac = image(
            ObjectType::Apple,
            "/Users/haza/Library/Developer/Xcode/Archives/2017-06-19/CrashProbe 19-06-2017, 08.53.xcarchive/Products/Applications/CrashProbe.app/Contents/Frameworks/CrashLib.framework/Versions/A/CrashLib",
        );
        assert!(is_app_image(&mac));
    }

    #[test]
    fn test_support_frameworks() {
        let sentry = image(
            ObjectType::Apple,
            "/var/containers/Bundle/Application/B33C/SentryTest.app/Frameworks/Sentry.framework/Sentry",
        );
        assert!(!is_app_image(&sentry));

        let swift = image(
            ObjectType::Apple,
            "/var/containers/Bundle/Application/B33C/SentryTest.app/Frameworks/libswiftCore.dylib",
        );
        assert!(!is_app_image(&swift));
    }

    #[test]
    fn test_other_images() {
        assert!(is_app_image(&image(ObjectType::Elf, "/opt/app/bin/server")));
        assert!(!is_app_image(&image(
            ObjectType::Elf,
            "/lib/x86_64-linux-gnu/libc.so.6"
        )));
        assert!(!is_app_image(&image(
            ObjectType::Pe,
            "C:\\Windows\\System32\\kernel32.dll"
        )));
        assert!(is_app_image(&image(ObjectType::Pe, "C:\\Program Files\\App\\app.exe")));
        assert!(!is_app_image(&RawObjectInfo::default()));
    }

    #[test]
    fn test_unmatched_frame_default() {
        assert!(unmatched_frame_in_app(None));
        assert!(unmatched_frame_in_app(Some("/var/containers/Bundle/Application/X/App.app/App")));
        assert!(!unmatched_frame_in_app(Some("/usr/lib/system/libdyld.dylib")));
    }
}
