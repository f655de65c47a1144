//! Node classifier: structural roles of node types and the per-version
//! out-of-the-box (OOTB) node-type whitelists.
//!
//! The whitelists are one base set plus additive/removal deltas per version
//! family. Versions are matched by exact string; anything not enumerated has
//! no whitelist and is treated as customized.

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Page-like nodes that embed an ordered list of child nodes.
pub const CONTAINER_NODE_TYPES: &[&str] = &["PageNode", "CustomPageNode"];

/// Nodes whose `script` field references a script by id.
pub const SCRIPTED_NODE_TYPES: &[&str] =
    &["ScriptedDecisionNode", "ClientScriptNode", "CustomScriptNode"];

/// Nodes whose `emailTemplateName` field references an IDM email template.
pub const EMAIL_TEMPLATE_NODE_TYPES: &[&str] = &["EmailSuspendNode", "EmailTemplateNode"];

/// OOTB node types shipped with the 6.x platform. Base of every family.
const BASE_OOTB_NODE_TYPES: &[&str] = &[
    "AbstractSocialAuthLoginNode",
    "AccountLockoutNode",
    "AgentDataStoreDecisionNode",
    "AnonymousUserNode",
    "AuthLevelDecisionNode",
    "ChoiceCollectorNode",
    "CookiePresenceDecisionNode",
    "CreatePasswordNode",
    "DataStoreDecisionNode",
    "InnerTreeEvaluatorNode",
    "LdapDecisionNode",
    "MessageNode",
    "MetadataNode",
    "MeterNode",
    "ModifyAuthLevelNode",
    "OneTimePasswordCollectorDecisionNode",
    "OneTimePasswordGeneratorNode",
    "OneTimePasswordSmsSenderNode",
    "OneTimePasswordSmtpSenderNode",
    "PageNode",
    "PasswordCollectorNode",
    "PersistentCookieDecisionNode",
    "PollingWaitNode",
    "ProvisionDynamicAccountNode",
    "ProvisionIdmAccountNode",
    "PushAuthenticationSenderNode",
    "PushResultVerifierNode",
    "RecoveryCodeCollectorDecisionNode",
    "RecoveryCodeDisplayNode",
    "RegisterLogoutWebhookNode",
    "RemoveSessionPropertiesNode",
    "RetryLimitDecisionNode",
    "ScriptedDecisionNode",
    "SessionDataNode",
    "SetFailureUrlNode",
    "SetPersistentCookieNode",
    "SetSessionPropertiesNode",
    "SetSuccessUrlNode",
    "SocialFacebookNode",
    "SocialGoogleNode",
    "SocialNode",
    "SocialOAuthIgnoreProfileNode",
    "SocialOpenIdConnectNode",
    "TimerStartNode",
    "TimerStopNode",
    "UsernameCollectorNode",
    "WebAuthnAuthenticationNode",
    "WebAuthnRegistrationNode",
    "ZeroPageLoginNode",
];

const V7_0_REMOVED: &[&str] = &["AbstractSocialAuthLoginNode"];

const V7_0_ADDED: &[&str] = &[
    "AcceptTermsAndConditionsNode",
    "AccountActiveDecisionNode",
    "AnonymousSessionUpgradeNode",
    "AttributeCollectorNode",
    "AttributePresentDecisionNode",
    "AttributeValueDecisionNode",
    "ConsentNode",
    "CreateObjectNode",
    "DeviceGeoFencingNode",
    "DeviceLocationMatchNode",
    "DeviceMatchNode",
    "DeviceProfileCollectorNode",
    "DeviceSaveNode",
    "DeviceTamperingVerificationNode",
    "DisplayUserNameNode",
    "EmailSuspendNode",
    "EmailTemplateNode",
    "IdentifyExistingUserNode",
    "IncrementLoginCountNode",
    "IotAuthenticationNode",
    "IotRegistrationNode",
    "KbaCreateNode",
    "KbaDecisionNode",
    "KbaVerifyNode",
    "LoginCountDecisionNode",
    "PatchObjectNode",
    "ProfileCompletenessDecisionNode",
    "QueryFilterDecisionNode",
    "RequiredAttributesDecisionNode",
    "SelectIdPNode",
    "SocialProviderHandlerNode",
    "TermsAndConditionsDecisionNode",
    "TimeSinceDecisionNode",
    "ValidatedPasswordNode",
    "ValidatedUsernameNode",
    "WebAuthnDeviceStorageNode",
    "product-CertificateCollectorNode",
    "product-CertificateUserExtractorNode",
    "product-CertificateValidationNode",
    "product-KerberosNode",
    "product-ReCaptchaNode",
    "product-Saml2Node",
    "product-WriteFederationInformationNode",
];

const V7_1_ADDED: &[&str] = &[
    "GetAuthenticatorAppNode",
    "MultiFactorRegistrationOptionsNode",
    "OptOutMultiFactorAuthenticationNode",
    "PushRegistrationNode",
];

/// Server version families that carry an OOTB whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionFamily {
    V6_0,
    V6_5,
    V7_0,
    V7_1,
}

impl VersionFamily {
    pub const ALL: [VersionFamily; 4] = [
        VersionFamily::V6_0,
        VersionFamily::V6_5,
        VersionFamily::V7_0,
        VersionFamily::V7_1,
    ];

    /// Exact version strings belonging to this family.
    pub fn versions(&self) -> &'static [&'static str] {
        match self {
            VersionFamily::V6_0 => &[
                "6.0.0", "6.0.0.1", "6.0.0.2", "6.0.0.3", "6.0.0.4", "6.0.0.5", "6.0.0.6",
                "6.0.0.7",
            ],
            VersionFamily::V6_5 => &[
                "6.5.0.1", "6.5.0.2", "6.5.1", "6.5.2", "6.5.2.1", "6.5.2.2", "6.5.2.3", "6.5.3",
            ],
            VersionFamily::V7_0 => &["7.0.0", "7.0.1", "7.0.2"],
            VersionFamily::V7_1 => &["7.1.0"],
        }
    }

    /// Family for an exact version string, `None` when not enumerated.
    pub fn from_version(version: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.versions().contains(&version))
    }

    fn build_whitelist(&self) -> HashSet<&'static str> {
        let mut set: HashSet<&'static str> = BASE_OOTB_NODE_TYPES.iter().copied().collect();
        if matches!(self, VersionFamily::V7_0 | VersionFamily::V7_1) {
            for removed in V7_0_REMOVED {
                set.remove(removed);
            }
            set.extend(V7_0_ADDED.iter().copied());
        }
        if matches!(self, VersionFamily::V7_1) {
            set.extend(V7_1_ADDED.iter().copied());
        }
        set
    }

    /// The family's OOTB node-type set, built once per process.
    pub fn whitelist(&self) -> &'static HashSet<&'static str> {
        static V6_0: OnceLock<HashSet<&'static str>> = OnceLock::new();
        static V6_5: OnceLock<HashSet<&'static str>> = OnceLock::new();
        static V7_0: OnceLock<HashSet<&'static str>> = OnceLock::new();
        static V7_1: OnceLock<HashSet<&'static str>> = OnceLock::new();

        let cell = match self {
            VersionFamily::V6_0 => &V6_0,
            VersionFamily::V6_5 => &V6_5,
            VersionFamily::V7_0 => &V7_0,
            VersionFamily::V7_1 => &V7_1,
        };
        cell.get_or_init(|| self.build_whitelist())
    }
}

/// Structural roles of a node type. The role tables are disjoint, so at most
/// one flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRole {
    pub is_container: bool,
    pub is_scripted: bool,
    pub has_email_template: bool,
}

/// Pure set-membership lookup of a node type's roles.
pub fn classify_role(node_type: &str) -> NodeRole {
    NodeRole {
        is_container: CONTAINER_NODE_TYPES.contains(&node_type),
        is_scripted: SCRIPTED_NODE_TYPES.contains(&node_type),
        has_email_template: EMAIL_TEMPLATE_NODE_TYPES.contains(&node_type),
    }
}

/// Whitelist for a server version, `None` for versions outside every family.
pub fn ootb_whitelist(version: &str) -> Option<&'static HashSet<&'static str>> {
    VersionFamily::from_version(version).map(|family| family.whitelist())
}

/// Whether `node_type` ships out of the box with `version`. Unknown versions
/// answer `false`.
pub fn is_ootb(version: &str, node_type: &str) -> bool {
    ootb_whitelist(version).is_some_and(|set| set.contains(node_type))
}
