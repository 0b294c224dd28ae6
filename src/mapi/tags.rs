//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Mapicore.
//
// Mapicore is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapicore is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mapicore. If not, see <http://www.gnu.org/licenses/>.

//! Well-known property tags.

use super::model::PropTag;

macro_rules! tags {
    ($($name:ident = $val:expr;)*) => {
        $(pub const $name: PropTag = PropTag($val);)*
    };
}

// Store
tags! {
    PR_ACCESS_LEVEL = 0x0FF7_0003;
    PR_ASSOC_CONTENT_COUNT = 0x3617_0003;
    PR_ASSOC_MESSAGE_SIZE = 0x66B4_0003;
    PR_ASSOC_MESSAGE_SIZE_EXTENDED = 0x66B4_0014;
    PR_CODE_PAGE_ID = 0x66C3_0003;
    PR_CONTENT_COUNT = 0x3602_0003;
    PR_CONTENT_UNREAD = 0x3603_0003;
    PR_DELETE_AFTER_SUBMIT = 0x0E01_000B;
    PR_DELETED_ASSOC_MESSAGE_SIZE = 0x669D_0003;
    PR_DELETED_ASSOC_MESSAGE_SIZE_EXTENDED = 0x669D_0014;
    PR_DELETED_ASSOC_MSG_COUNT = 0x6643_0003;
    PR_DELETED_MESSAGE_SIZE = 0x669B_0003;
    PR_DELETED_MESSAGE_SIZE_EXTENDED = 0x669B_0014;
    PR_DELETED_MSG_COUNT = 0x6640_0003;
    PR_DELETED_NORMAL_MESSAGE_SIZE = 0x669C_0003;
    PR_DELETED_NORMAL_MESSAGE_SIZE_EXTENDED = 0x669C_0014;
    PR_DISPLAY_NAME = 0x3001_001F;
    PR_EMAIL_ADDRESS = 0x3003_001F;
    PR_EMAIL_ADDRESS_A = 0x3003_001E;
    PR_EMS_AB_DISPLAY_NAME_PRINTABLE = 0x39FF_001F;
    PR_EMS_AB_DISPLAY_NAME_PRINTABLE_A = 0x39FF_001E;
    PR_EXTENDED_RULE_SIZE_LIMIT = 0x0E9B_0003;
    PR_HIERARCHY_SERVER = 0x6633_001F;
    PR_INTERNET_ARTICLE_NUMBER = 0x0E23_0003;
    PR_LOCALE_ID = 0x66A1_0003;
    PR_MAILBOX_OWNER_ENTRYID = 0x661B_0102;
    PR_MAILBOX_OWNER_NAME = 0x661C_001F;
    PR_MAILBOX_OWNER_NAME_A = 0x661C_001E;
    PR_MAX_SUBMIT_MESSAGE_SIZE = 0x666D_0003;
    PR_MDB_PROVIDER = 0x3414_0102;
    PR_MESSAGE_SIZE = 0x0E08_0003;
    PR_MESSAGE_SIZE_EXTENDED = 0x0E08_0014;
    PR_NORMAL_MESSAGE_SIZE = 0x66B3_0003;
    PR_NORMAL_MESSAGE_SIZE_EXTENDED = 0x66B3_0014;
    PR_OBJECT_TYPE = 0x0FFE_0003;
    PR_OOF_STATE = 0x661D_000B;
    PR_PROHIBIT_RECEIVE_QUOTA = 0x666A_0003;
    PR_PROHIBIT_SEND_QUOTA = 0x666E_0003;
    PR_RECORD_KEY = 0x0FF9_0102;
    PR_SEARCH_KEY = 0x300B_0102;
    PR_SORT_LOCALE_ID = 0x6705_0003;
    PR_STORAGE_QUOTA_LIMIT = 0x3FF5_0003;
    PR_STORE_ENTRYID = 0x0FFB_0102;
    PR_STORE_OFFLINE = 0x6632_000B;
    PR_STORE_RECORD_KEY = 0x0FFA_0102;
    PR_STORE_STATE = 0x340E_0003;
    PR_STORE_SUPPORT_MASK = 0x340D_0003;
    PR_TEST_LINE_SPEED = 0x662B_0102;
    PR_USER_ENTRYID = 0x6619_0102;
    PR_VALID_FOLDER_MASK = 0x35DF_0003;
}

// Messages and folders
tags! {
    PR_ACCESS = 0x0FF4_0003;
    PR_ASSOCIATED = 0x67AA_000B;
    PR_CHANGE_KEY = 0x65E2_0102;
    PR_CHANGE_NUMBER = 0x67A4_0014;
    PR_CREATION_TIME = 0x3007_0040;
    PR_ENTRYID = 0x0FFF_0102;
    PR_FOLDER_ID = 0x6748_0014;
    PR_HASATTACH = 0x0E1B_000B;
    PR_HAS_NAMED_PROPERTIES = 0x664A_000B;
    PR_INSTANCE_KEY = 0x0FF6_0102;
    PR_INTERNET_CPID = 0x3FDE_0003;
    PR_LAST_MODIFICATION_TIME = 0x3008_0040;
    PR_MESSAGE_CLASS = 0x001A_001F;
    PR_MESSAGE_FLAGS = 0x0E07_0003;
    PR_MID = 0x674A_0014;
    PR_MSG_STATUS = 0x0E17_0003;
    PR_NON_RECEIPT_NOTIFICATION_REQUESTED = 0x0C06_000B;
    PR_NORMALIZED_SUBJECT = 0x0E1D_001F;
    PR_PARENT_FOLDER_ID = 0x6749_0014;
    PR_PREDECESSOR_CHANGE_LIST = 0x65E3_0102;
    PR_READ = 0x0E69_000B;
    PR_READ_RECEIPT_REQUESTED = 0x0029_000B;
    PR_SOURCE_KEY = 0x65E0_0102;
    PR_SUBJECT = 0x0037_001F;
    PR_SUBJECT_PREFIX = 0x003D_001F;
}

// Bodies
tags! {
    PR_BODY = 0x1000_001F;
    PR_BODY_A = 0x1000_001E;
    PR_BODY_U = 0x1000_0000;
    PR_HTML = 0x1013_0102;
    PR_HTML_U = 0x1013_0000;
    PR_RTF_COMPRESSED = 0x1009_0102;
}

// Recipients
tags! {
    PR_ADDRTYPE = 0x3002_001F;
    PR_RECIPIENT_TYPE = 0x0C15_0003;
    PR_ROWID = 0x3000_0003;
    PR_SEND_RICH_INFO = 0x3A40_000B;
    PR_SMTP_ADDRESS = 0x39FE_001F;
    PR_TRANSMITABLE_DISPLAY_NAME = 0x3A20_001F;
}

// Attachments
tags! {
    PR_ATTACH_DATA_BIN = 0x3701_0102;
    PR_ATTACH_DATA_OBJ = 0x3701_000D;
    PR_ATTACH_LONG_FILENAME = 0x3707_001F;
    PR_ATTACH_METHOD = 0x3705_0003;
    PR_ATTACH_NUM = 0x0E21_0003;
    PR_ATTACH_SIZE = 0x0E20_0003;
    PR_RENDERING_POSITION = 0x370B_0003;
}

// Incremental change synchronisation
tags! {
    META_TAG_IDSET_GIVEN = 0x4017_0003;
    META_TAG_CNSET_SEEN = 0x6796_0102;
    META_TAG_CNSET_SEEN_FAI = 0x67DA_0102;
    META_TAG_CNSET_READ = 0x67D2_0102;
}

pub const MSGFLAG_READ: u32 = 0x0001;
pub const MSGFLAG_UNMODIFIED: u32 = 0x0002;
pub const MSGFLAG_UNSENT: u32 = 0x0008;
pub const MSGFLAG_HASATTACH: u32 = 0x0010;
pub const MSGFLAG_ASSOCIATED: u32 = 0x0040;
pub const MSGFLAG_RN_PENDING: u32 = 0x0100;
pub const MSGFLAG_NRN_PENDING: u32 = 0x0200;

pub const MSGSTATUS_IN_CONFLICT: u32 = 0x0800;

pub const MAPI_STORE: u32 = 1;
pub const MAPI_FOLDER: u32 = 3;
pub const MAPI_MESSAGE: u32 = 5;
pub const MAPI_ATTACH: u32 = 7;

pub const ATTACH_BY_VALUE: u32 = 1;
pub const ATTACH_EMBEDDED_MSG: u32 = 5;
